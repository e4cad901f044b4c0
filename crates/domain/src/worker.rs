use serde::{Deserialize, Serialize};

/// The registered worker set. Exactly six — see DESIGN.md for why a
/// seventh (`browser`) is not included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerName {
    Researcher,
    Coder,
    DbAnalyst,
    DocumentParser,
    ChartGenerator,
    Reporter,
}

impl WorkerName {
    pub const ALL: [WorkerName; 6] = [
        WorkerName::Researcher,
        WorkerName::Coder,
        WorkerName::DbAnalyst,
        WorkerName::DocumentParser,
        WorkerName::ChartGenerator,
        WorkerName::Reporter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerName::Researcher => "researcher",
            WorkerName::Coder => "coder",
            WorkerName::DbAnalyst => "db_analyst",
            WorkerName::DocumentParser => "document_parser",
            WorkerName::ChartGenerator => "chart_generator",
            WorkerName::Reporter => "reporter",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<WorkerName> {
        WorkerName::ALL.into_iter().find(|w| w.as_str() == s)
    }
}

impl std::fmt::Display for WorkerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The supervisor's routing decision: a worker name, or the sentinel that
/// ends the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Worker(WorkerName),
    Finish,
}

impl RouteDecision {
    pub fn parse(next: &str) -> Option<RouteDecision> {
        if next.eq_ignore_ascii_case("FINISH") {
            return Some(RouteDecision::Finish);
        }
        WorkerName::from_str_loose(next).map(RouteDecision::Worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_six_workers_round_trip_through_as_str() {
        for w in WorkerName::ALL {
            assert_eq!(WorkerName::from_str_loose(w.as_str()), Some(w));
        }
    }

    #[test]
    fn browser_is_not_a_registered_worker() {
        assert_eq!(WorkerName::from_str_loose("browser"), None);
    }

    #[test]
    fn route_decision_parses_finish_case_insensitively() {
        assert_eq!(RouteDecision::parse("FINISH"), Some(RouteDecision::Finish));
        assert_eq!(RouteDecision::parse("finish"), Some(RouteDecision::Finish));
    }

    #[test]
    fn route_decision_rejects_unknown_worker() {
        assert_eq!(RouteDecision::parse("browser"), None);
    }
}
