//! xflow flow schema
//!
//! Defines the flow identity and per-CPU accumulator layouts shared with the
//! XDP classifier, plus the merge of per-CPU shards into a single flow view.

mod flow;
mod merge;

pub use flow::{
    Accumulator, FlowKey, LayoutError, ACCUMULATOR_SIZE, ETHERTYPE_IPV4, ETHERTYPE_IPV6,
    ETHERTYPE_VLAN, FLOW_KEY_SIZE,
};
pub use merge::{fold_shards, merge_shards, MergedFlowView};
