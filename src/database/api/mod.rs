mod audit;
mod match_row;
mod player;
mod rating;
mod replay;

pub use audit::*;
pub use match_row::*;
pub use player::*;
pub use rating::*;
pub use replay::*;

/// Everything the Write Log's drain worker and the store's hydration path
/// need from persistence, bundled behind one object-safe trait so callers
/// hold a single `Arc<dyn Database>` rather than five.
pub trait Database:
    PlayerQueries
    + RatingQueries
    + MatchQueries
    + ReplayQueries
    + AdminActionQueries
    + PlayerActionQueries
    + CommandCallQueries
    + Send
    + Sync
{
}

impl<T> Database for T where
    T: PlayerQueries
        + RatingQueries
        + MatchQueries
        + ReplayQueries
        + AdminActionQueries
        + PlayerActionQueries
        + CommandCallQueries
        + Send
        + Sync
{
}
