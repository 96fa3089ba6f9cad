//! Unshield worker bridge: typed calls from the desktop process, forwarded by
//! the worker to the wallet SDK.

pub mod call;
pub mod ipc;
pub mod jsonrpc;
pub mod registry;
pub mod sdk;
pub mod unshield;

use std::sync::Arc;

pub use call::{
    BridgeCall, BridgeCallEvent, BridgeOperation, GasEstimateForUnprovenUnshieldBaseTokenParams,
    GasEstimateForUnprovenUnshieldParams, GasEstimateForUnprovenUnshieldToOriginParams,
    GetErc20AndNftAmountRecipientsForUnshieldToOriginParams,
    PopulateProvedUnshieldBaseTokenParams, PopulateProvedUnshieldParams,
    PopulateProvedUnshieldToOriginParams,
};
pub use ipc::{serve, BridgeClient, Outcome, ReplyFrame, RequestFrame};
pub use jsonrpc::{JsonRpcClient, JsonRpcSdk};
pub use registry::{BridgeError, BridgeFault, BridgeRegistry};
pub use sdk::{SdkError, SdkReply, UnshieldSdk};
pub use unshield::register_unshield_handlers;

/// Registry with every unshield event wired to `sdk`.
pub fn unshield_registry<S>(sdk: Arc<S>) -> BridgeRegistry<S>
where
    S: UnshieldSdk + ?Sized + 'static,
{
    let mut registry = BridgeRegistry::new(sdk);
    register_unshield_handlers(&mut registry);
    registry
}
