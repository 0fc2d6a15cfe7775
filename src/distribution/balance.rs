//! Least-loaded producer selection.

use crate::model::Workload;

/// The producer with the fewest active points.
///
/// Ties go to the earliest entry, so the caller's ordering of the eligible
/// producers is the tie-break. `None` when there is nobody to pick.
pub fn least_loaded(workloads: &[Workload]) -> Option<&Workload> {
    workloads.iter().min_by_key(|w| w.total_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CollaboratorId;

    fn load(name: &str, points: i64) -> Workload {
        Workload {
            producer_id: CollaboratorId::new(),
            producer_name: name.to_string(),
            active_projects: u32::try_from(points).unwrap_or(0),
            total_points: points,
        }
    }

    #[test]
    fn picks_smallest_point_total() {
        let loads = [load("A", 10), load("B", 3), load("C", 7)];
        assert_eq!(least_loaded(&loads).unwrap().producer_name, "B");
    }

    #[test]
    fn ties_go_to_first_in_input_order() {
        let loads = [load("A", 4), load("B", 2), load("C", 2)];
        assert_eq!(least_loaded(&loads).unwrap().producer_name, "B");

        let loads = [load("C", 0), load("A", 0)];
        assert_eq!(least_loaded(&loads).unwrap().producer_name, "C");
    }

    #[test]
    fn empty_pool_picks_nobody() {
        assert!(least_loaded(&[]).is_none());
    }
}
