//! nobre CLI: operator interface to production distribution.

use nobre_hub::config::Config;
use nobre_hub::config::secrets::redacted_database_url;
use nobre_hub::db::Db;
use nobre_hub::distribution::{DistributionConfig, Distributor};
use nobre_hub::model::*;
use nobre_hub::storage::CollaboratorDirectory;
use nobre_hub::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "nobre", about = "Production distribution for Nobre Hub")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the distribution queue and log every change
    Serve,
    /// Show projects awaiting a producer
    Queue,
    /// Show producer workload (defaults to the whole production pool)
    Workload {
        /// Producer IDs
        producers: Vec<Uuid>,
    },
    /// Project operations
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Assign a project to a producer
    Assign {
        project: Uuid,
        producer: Uuid,
        /// Leader making the decision
        #[arg(long)]
        leader: Uuid,
    },
    /// Assign one project to the least-loaded producer
    AutoAssign {
        project: Uuid,
        #[arg(long)]
        leader: Uuid,
    },
    /// Assign every pending project to the least-loaded producers
    AutoAssignAll {
        #[arg(long)]
        leader: Uuid,
    },
    /// Sector operations
    Sector {
        #[command(subcommand)]
        action: SectorAction,
    },
    /// Collaborator operations
    Collaborator {
        #[command(subcommand)]
        action: CollaboratorAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Submit a project for distribution
    Submit {
        name: String,
        /// Total points
        #[arg(long)]
        points: Option<i32>,
        /// Base points, used when total points are unset
        #[arg(long)]
        base_points: Option<i32>,
        #[arg(long)]
        client: Option<String>,
        /// Suggested producer; blocks automatic assignment
        #[arg(long)]
        suggest: Option<Uuid>,
    },
    /// Show a project
    Show { id: Uuid },
    /// Change the production status
    Status {
        id: Uuid,
        /// aguardando | em_producao | em_revisao | entregue | concluido
        status: String,
    },
}

#[derive(Subcommand)]
enum SectorAction {
    Add { name: String },
}

#[derive(Subcommand)]
enum CollaboratorAction {
    Add {
        name: String,
        #[arg(long)]
        sector: Option<Uuid>,
        #[arg(long)]
        inactive: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "nobre".to_string(),
        default_filter: config.log_level.clone(),
    })?;
    tracing::debug!(otlp = guard.is_exporting(), "telemetry ready");

    tracing::debug!(database = %redacted_database_url(&config.database_url), "connecting");
    let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
    db.migrate().await?;

    let distributor = Distributor::new(
        Arc::clone(&db),
        db.clone(),
        DistributionConfig {
            production_sectors: config.production_sectors.clone(),
        },
    );

    match cli.command {
        Command::Serve => cmd_serve(&distributor).await,
        Command::Queue => cmd_queue(&distributor).await,
        Command::Workload { producers } => cmd_workload(&distributor, producers).await,
        Command::Project { action } => match action {
            ProjectAction::Submit {
                name,
                points,
                base_points,
                client,
                suggest,
            } => cmd_project_submit(&distributor, name, points, base_points, client, suggest).await,
            ProjectAction::Show { id } => cmd_project_show(&distributor, id).await,
            ProjectAction::Status { id, status } => {
                let status: ProductionStatus = status.parse()?;
                let project = distributor
                    .set_production_status(ProjectId(id), status)
                    .await?;
                println!("Updated: {} (status: {})", project.id, project.status);
                Ok(())
            }
        },
        Command::Assign {
            project,
            producer,
            leader,
        } => cmd_assign(&distributor, project, producer, leader).await,
        Command::AutoAssign { project, leader } => {
            cmd_auto_assign(&distributor, project, leader).await
        }
        Command::AutoAssignAll { leader } => cmd_auto_assign_all(&distributor, leader).await,
        Command::Sector {
            action: SectorAction::Add { name },
        } => {
            let sector = db.create_sector(&name).await?;
            println!("Created sector: {} ({})", sector.name, sector.id);
            Ok(())
        }
        Command::Collaborator {
            action:
                CollaboratorAction::Add {
                    name,
                    sector,
                    inactive,
                },
        } => {
            let collaborator = db
                .create_collaborator(&name, sector.map(SectorId), !inactive)
                .await?;
            println!(
                "Created collaborator: {} ({})",
                collaborator.name, collaborator.id.0
            );
            Ok(())
        }
    }
}

async fn cmd_serve(distributor: &Distributor<Db>) -> anyhow::Result<()> {
    let subscription = distributor
        .subscribe(|queue| {
            let suggested = queue
                .iter()
                .filter(|p| p.distribution_status == DistributionStatus::Suggested)
                .count();
            tracing::info!(
                queued = queue.len(),
                suggested,
                "distribution queue updated"
            );
        })
        .await?;

    tracing::info!("watching distribution queue, ctrl-c to stop");
    tokio::signal::ctrl_c().await.ok();
    subscription.unsubscribe().await;
    tracing::info!("stopped");
    Ok(())
}

async fn cmd_queue(distributor: &Distributor<Db>) -> anyhow::Result<()> {
    let queue = distributor.queue().await?;

    if queue.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<30}  {:<10}  {:<6}  {:<8}  CREATED",
        "ID", "NAME", "STATUS", "POINTS", "SUGGEST"
    );
    println!("{}", "-".repeat(110));

    for project in &queue {
        let suggested = project
            .suggested_producer_id
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36}  {:<30}  {:<10}  {:<6}  {:<8}  {}",
            project.id.0,
            truncate(&project.name, 30),
            project.distribution_status,
            project.weight(),
            suggested,
            project.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\n{} project(s) queued", queue.len());
    Ok(())
}

async fn cmd_workload(distributor: &Distributor<Db>, producers: Vec<Uuid>) -> anyhow::Result<()> {
    let ids: Vec<ProducerId> = if producers.is_empty() {
        distributor
            .eligible_producers()
            .await?
            .iter()
            .map(|c| c.id)
            .collect()
    } else {
        producers.into_iter().map(CollaboratorId).collect()
    };

    let workloads = distributor.workload_of_all(&ids).await?;
    if workloads.is_empty() {
        println!("No producers.");
        return Ok(());
    }

    println!("{:<36}  {:<24}  {:<6}  POINTS", "PRODUCER", "NAME", "ACTIVE");
    println!("{}", "-".repeat(80));
    for w in &workloads {
        println!(
            "{:<36}  {:<24}  {:<6}  {}",
            w.producer_id.0,
            truncate(&w.producer_name, 24),
            w.active_projects,
            w.total_points
        );
    }
    Ok(())
}

async fn cmd_project_submit(
    distributor: &Distributor<Db>,
    name: String,
    points: Option<i32>,
    base_points: Option<i32>,
    client: Option<String>,
    suggest: Option<Uuid>,
) -> anyhow::Result<()> {
    let mut new = NewProject::new(name);
    if let Some(p) = points {
        new = new.total_points(p);
    }
    if let Some(p) = base_points {
        new = new.base_points(p);
    }
    if let Some(c) = client {
        new = new.client(c);
    }
    if let Some(s) = suggest {
        new = new.suggest(CollaboratorId(s));
    }

    let project = distributor.submit_project(new).await?;
    println!(
        "Submitted: {} (distribution: {})",
        project.id.0, project.distribution_status
    );
    Ok(())
}

async fn cmd_project_show(distributor: &Distributor<Db>, id: Uuid) -> anyhow::Result<()> {
    let project = distributor.get_project(ProjectId(id)).await?;

    println!("ID:           {}", project.id.0);
    println!("Name:         {}", project.name);
    println!("Client:       {}", project.client_name.as_deref().unwrap_or("-"));
    println!("Distribution: {}", project.distribution_status);
    println!("Status:       {}", project.status);
    println!(
        "Points:       {} (total {:?}, base {:?})",
        project.weight(),
        project.total_points,
        project.base_points
    );
    if let Some(suggested) = project.suggested_producer_id {
        println!("Suggested:    {}", suggested.0);
    }
    if let Some(producer) = project.producer_id {
        println!(
            "Producer:     {} ({})",
            project.producer_name.as_deref().unwrap_or("-"),
            producer.0
        );
    }
    if let Some(leader) = project.assigned_by_leader_id {
        println!("Assigned by:  {}", leader.0);
    }
    if let Some(at) = project.assigned_at {
        println!("Assigned at:  {at}");
    }
    println!("Created:      {}", project.created_at);
    println!("Updated:      {}", project.updated_at);
    Ok(())
}

async fn cmd_assign(
    distributor: &Distributor<Db>,
    project: Uuid,
    producer: Uuid,
    leader: Uuid,
) -> anyhow::Result<()> {
    let producer_id = CollaboratorId(producer);
    let name = distributor
        .store()
        .collaborator_name(producer_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no collaborator {producer}"))?;

    let assignment = distributor
        .assign(
            ProjectId(project),
            &ProducerRef {
                id: producer_id,
                name,
            },
            CollaboratorId(leader),
        )
        .await?;
    println!(
        "Assigned: {} -> {}",
        assignment.project_id, assignment.producer_name
    );
    Ok(())
}

async fn cmd_auto_assign(
    distributor: &Distributor<Db>,
    project: Uuid,
    leader: Uuid,
) -> anyhow::Result<()> {
    let pool: Vec<ProducerId> = distributor
        .eligible_producers()
        .await?
        .iter()
        .map(|c| c.id)
        .collect();

    match distributor
        .auto_assign(ProjectId(project), &pool, CollaboratorId(leader))
        .await?
    {
        Some(assignment) => println!(
            "Assigned: {} -> {}",
            assignment.project_id, assignment.producer_name
        ),
        None => println!("Skipped: project has a suggested producer, assign it manually"),
    }
    Ok(())
}

async fn cmd_auto_assign_all(distributor: &Distributor<Db>, leader: Uuid) -> anyhow::Result<()> {
    let report = distributor
        .auto_assign_all_pending_to_pool(CollaboratorId(leader))
        .await?;

    for assignment in &report.assigned {
        println!(
            "Assigned: {} -> {}",
            assignment.project_id, assignment.producer_name
        );
    }
    for failure in &report.failures {
        eprintln!("Failed:   {}: {}", failure.project_id, failure.error);
    }
    println!(
        "\n{} assigned, {} left for manual assignment, {} failed",
        report.count(),
        report.skipped,
        report.failures.len()
    );

    if !report.failures.is_empty() {
        anyhow::bail!("{} project(s) could not be assigned", report.failures.len());
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}
