pub mod export;
pub mod import;
pub mod library;
pub mod persistence;
pub mod planner;
pub mod scaling;
pub mod session;
pub mod week;

pub use crate::domain::model::{Recipe, WeekKey, WeeklyMealPlan};
pub use crate::domain::ports::{DocumentStore, RecipeProvider};
pub use crate::utils::error::Result;
pub use persistence::Persistence;
pub use session::{SessionState, SessionStore, StorageStatus};
