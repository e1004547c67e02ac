pub mod agent;
pub mod gate;
pub mod planner;
pub mod store;
pub mod tools;

pub use agent::AgentService;
pub use gate::RoleGate;
pub use planner::{LlmPlanner, Planner, PlannerDecision, RulePlanner};
pub use store::SessionStore;
pub use tools::{build_registry, Tool, ToolRegistry};
