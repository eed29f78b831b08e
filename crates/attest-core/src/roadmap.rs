//! Product phases shown on the Vision & Roadmap page.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadmapPhase {
    pub phase: u8,
    pub title: &'static str,
    pub done: bool,
}

pub const ROADMAP: [RoadmapPhase; 7] = [
    RoadmapPhase {
        phase: 1,
        title: "Manual Upload & Role-based Assignment",
        done: true,
    },
    RoadmapPhase {
        phase: 2,
        title: "AI-Powered Summaries & Audit Logging",
        done: true,
    },
    RoadmapPhase {
        phase: 3,
        title: "Dashboard Insights + Overdue Tracking",
        done: true,
    },
    RoadmapPhase {
        phase: 4,
        title: "Azure Integration for Deployment",
        done: true,
    },
    RoadmapPhase {
        phase: 5,
        title: "Pilot with Small FinTech Clients",
        done: false,
    },
    RoadmapPhase {
        phase: 6,
        title: "Add Alert Logic + Role-Specific Views",
        done: false,
    },
    RoadmapPhase {
        phase: 7,
        title: "Secure Sign-In + Multi-Region Scaling",
        done: false,
    },
];
