use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::{BridgeCall, BridgeCallEvent, BridgeOperation};
use crate::sdk::{SdkError, SdkReply};

/// Failure carried back across the bridge in place of a result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeFault {
    Sdk(SdkError),
    Unregistered { event: BridgeCallEvent },
    Codec { message: String },
}

impl fmt::Display for BridgeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeFault::Sdk(err) => write!(f, "sdk error: {err}"),
            BridgeFault::Unregistered { event } => write!(f, "no handler registered for {event}"),
            BridgeFault::Codec { message } => write!(f, "codec error: {message}"),
        }
    }
}

impl std::error::Error for BridgeFault {}

impl From<SdkError> for BridgeFault {
    fn from(err: SdkError) -> Self {
        BridgeFault::Sdk(err)
    }
}

/// Caller-side error for a bridge request.
#[derive(Debug)]
pub enum BridgeError {
    Sdk(SdkError),
    Unregistered(BridgeCallEvent),
    Codec(String),
    Io(std::io::Error),
    WorkerExited,
    UnexpectedResponse(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Sdk(err) => write!(f, "{err}"),
            BridgeError::Unregistered(event) => write!(f, "worker has no handler for {event}"),
            BridgeError::Codec(message) => write!(f, "bridge codec error: {message}"),
            BridgeError::Io(err) => write!(f, "bridge io error: {err}"),
            BridgeError::WorkerExited => write!(f, "worker exited before replying"),
            BridgeError::UnexpectedResponse(message) => {
                write!(f, "unexpected worker response: {message}")
            }
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<BridgeFault> for BridgeError {
    fn from(fault: BridgeFault) -> Self {
        match fault {
            BridgeFault::Sdk(err) => BridgeError::Sdk(err),
            BridgeFault::Unregistered { event } => BridgeError::Unregistered(event),
            BridgeFault::Codec { message } => BridgeError::Codec(message),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err)
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, BridgeFault>> + Send>>;

type Handler<S> = Box<dyn Fn(Arc<S>, BridgeCall) -> HandlerFuture + Send + Sync>;

/// Event to handler table. One handler per event; registering an event a
/// second time replaces the earlier handler.
pub struct BridgeRegistry<S: ?Sized> {
    sdk: Arc<S>,
    handlers: HashMap<BridgeCallEvent, Handler<S>>,
}

impl<S: ?Sized + Send + Sync + 'static> BridgeRegistry<S> {
    pub fn new(sdk: Arc<S>) -> Self {
        Self {
            sdk,
            handlers: HashMap::new(),
        }
    }

    pub fn register<Op, F, Fut>(&mut self, handler: F)
    where
        Op: BridgeOperation,
        F: Fn(Arc<S>, Op) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SdkReply<Op::Response>, SdkError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let boxed: Handler<S> = Box::new(move |sdk, call| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let params = Op::try_from(call).map_err(|other| BridgeFault::Codec {
                    message: format!("{} routed to {} handler", other.event(), Op::EVENT),
                })?;
                let reply = handler(sdk, params).await?;
                Ok(reply.into_raw())
            })
        });
        self.handlers.insert(Op::EVENT, boxed);
    }

    pub fn is_registered(&self, event: BridgeCallEvent) -> bool {
        self.handlers.contains_key(&event)
    }

    pub fn events(&self) -> Vec<BridgeCallEvent> {
        let mut events: Vec<_> = self.handlers.keys().copied().collect();
        events.sort();
        events
    }

    /// Runs the handler registered for the call's event. The returned future
    /// owns everything it needs, so it can be spawned.
    pub fn dispatch(&self, call: BridgeCall) -> HandlerFuture {
        let event = call.event();
        match self.handlers.get(&event) {
            Some(handler) => handler(Arc::clone(&self.sdk), call),
            None => Box::pin(async move { Err(BridgeFault::Unregistered { event }) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::GetErc20AndNftAmountRecipientsForUnshieldToOriginParams;
    use shade_models::{NetworkName, TxidVersion, UnshieldToOriginRecipients};

    fn params() -> GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
        GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
            txid_version: TxidVersion::V2PoseidonMerkle,
            network_name: NetworkName::Arbitrum,
            railgun_wallet_id: "w".to_string(),
            original_shield_txid: "0xabc".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_handler_is_a_fault() {
        let registry: BridgeRegistry<()> = BridgeRegistry::new(Arc::new(()));
        let err = registry.dispatch(params().into()).await.unwrap_err();
        assert_eq!(
            err,
            BridgeFault::Unregistered {
                event: BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin
            }
        );
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier() {
        let mut registry: BridgeRegistry<()> = BridgeRegistry::new(Arc::new(()));
        registry.register(
            |_sdk: Arc<()>, _params: GetErc20AndNftAmountRecipientsForUnshieldToOriginParams| async {
                Err::<SdkReply<UnshieldToOriginRecipients>, _>(SdkError::new("first"))
            },
        );
        registry.register(
            |_sdk: Arc<()>, _params: GetErc20AndNftAmountRecipientsForUnshieldToOriginParams| async {
                SdkReply::encode(&UnshieldToOriginRecipients::default())
            },
        );
        assert_eq!(registry.events().len(), 1);
        assert!(registry.is_registered(
            BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin
        ));
        assert!(!registry.is_registered(BridgeCallEvent::PopulateProvedUnshield));
        let value = registry.dispatch(params().into()).await.unwrap();
        assert_eq!(
            value,
            serde_json::json!({"erc20AmountRecipients": [], "nftAmountRecipients": []})
        );
    }
}
