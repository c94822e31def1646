use crate::extractor::MESSAGE_ID_ATTRIBUTE;
use crate::retry::RetrySchedule;

/// Default number of ancestors searched for framework instance data.
pub const DEFAULT_MAX_ANCESTOR_HOPS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub max_ancestor_hops: usize,
    pub retry: RetrySchedule,
    pub id_attribute: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_ancestor_hops: DEFAULT_MAX_ANCESTOR_HOPS,
            retry: RetrySchedule::default(),
            id_attribute: MESSAGE_ID_ATTRIBUTE.to_string(),
        }
    }
}
