mod definition;
mod presets;
mod query;
mod transfer;

pub use definition::{
    Grouping, InsightDefinition, InsightDefinitionRequestBody, InsightDisplayMode,
    InsightGroupByInterval, RollingWindow,
};
pub use presets::DEFAULT_BREAKDOWN_KEY;
pub use query::{Aggregation, InsightQuery, QueryInterval};
pub use transfer::InsightDataTransferObject;
