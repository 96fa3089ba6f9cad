//! Newline-delimited JSON transport between the desktop process and the
//! worker.
//!
//! Requests and replies carry a numeric id so several calls can be in flight
//! at once and complete in any order. The worker side answers every frame it
//! can attribute to an id; the client side fails everything still pending
//! once the worker's output closes.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shade_log::{log_debug, log_error, log_warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::call::{BridgeCall, BridgeOperation};
use crate::registry::{BridgeError, BridgeFault, BridgeRegistry};

const DUPLEX_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub call: BridgeCall,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok(Value),
    Err(BridgeFault),
}

impl From<Result<Value, BridgeFault>> for Outcome {
    fn from(result: Result<Value, BridgeFault>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(fault) => Outcome::Err(fault),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyFrame {
    pub id: u64,
    pub outcome: Outcome,
}

async fn write_frame<W, T>(writer: &mut W, frame: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(frame).map_err(io::Error::other)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

fn recover_id(line: &str) -> Option<u64> {
    serde_json::from_str::<Value>(line)
        .ok()?
        .get("id")?
        .as_u64()
}

/// Worker side: reads request frames until EOF, runs each on its own task
/// and writes replies as they finish. Returns once every accepted request
/// has been answered.
pub async fn serve<R, W, S>(reader: R, writer: W, registry: Arc<BridgeRegistry<S>>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: ?Sized + Send + Sync + 'static,
{
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ReplyFrame>();
    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(frame) = reply_rx.recv().await {
            write_frame(&mut writer, &frame).await?;
        }
        Ok::<(), io::Error>(())
    });

    let mut lines = BufReader::new(reader).lines();
    let mut accepted = 0u64;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RequestFrame>(&line) {
            Ok(RequestFrame { id, call }) => {
                accepted += 1;
                log_debug!("bridge request {id}: {}", call.event());
                let pending = registry.dispatch(call);
                let reply_tx = reply_tx.clone();
                tokio::spawn(async move {
                    let outcome = Outcome::from(pending.await);
                    let _ = reply_tx.send(ReplyFrame { id, outcome });
                });
            }
            Err(err) => match recover_id(&line) {
                Some(id) => {
                    let outcome = Outcome::Err(BridgeFault::Codec {
                        message: err.to_string(),
                    });
                    let _ = reply_tx.send(ReplyFrame { id, outcome });
                }
                None => log_warn!("dropping unreadable bridge frame: {err}"),
            },
        }
    }

    log_debug!("bridge input closed after {accepted} requests");
    drop(reply_tx);
    writer_task.await.map_err(io::Error::other)?
}

#[derive(Default)]
struct PendingCalls {
    closed: bool,
    waiters: HashMap<u64, oneshot::Sender<Outcome>>,
}

#[derive(Default)]
struct Pending {
    inner: Mutex<PendingCalls>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, PendingCalls> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: u64, waiter: oneshot::Sender<Outcome>) -> bool {
        let mut calls = self.lock();
        if calls.closed {
            return false;
        }
        calls.waiters.insert(id, waiter);
        true
    }

    fn resolve(&self, frame: ReplyFrame) {
        let waiter = self.lock().waiters.remove(&frame.id);
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(frame.outcome);
            }
            None => log_warn!("bridge reply for unknown request {}", frame.id),
        }
    }

    fn remove(&self, id: u64) {
        self.lock().waiters.remove(&id);
    }

    /// Dropping the senders wakes every waiter with a closed channel.
    fn close(&self) {
        let mut calls = self.lock();
        calls.closed = true;
        calls.waiters.clear();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Desktop side of the bridge.
pub struct BridgeClient {
    next_id: AtomicU64,
    outgoing: mpsc::UnboundedSender<RequestFrame>,
    pending: Arc<Pending>,
    tasks: Vec<JoinHandle<()>>,
    _child: Option<Child>,
}

impl BridgeClient {
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(reader, writer, None, Vec::new())
    }

    fn start<R, W>(reader: R, writer: W, child: Option<Child>, mut tasks: Vec<JoinHandle<()>>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending = Arc::new(Pending::default());
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<RequestFrame>();

        let writer_pending = Arc::clone(&pending);
        tasks.push(tokio::spawn(async move {
            let mut writer = writer;
            while let Some(frame) = outgoing_rx.recv().await {
                if let Err(err) = write_frame(&mut writer, &frame).await {
                    log_error!("bridge write failed: {err}");
                    writer_pending.close();
                    return;
                }
            }
        }));

        let reader_pending = Arc::clone(&pending);
        tasks.push(tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ReplyFrame>(&line) {
                            Ok(frame) => reader_pending.resolve(frame),
                            Err(err) => log_warn!("dropping unreadable bridge reply: {err}"),
                        }
                    }
                    Ok(None) => {
                        log_debug!("bridge output closed");
                        break;
                    }
                    Err(err) => {
                        log_error!("bridge read failed: {err}");
                        break;
                    }
                }
            }
            reader_pending.close();
        }));

        Self {
            next_id: AtomicU64::new(1),
            outgoing,
            pending,
            tasks,
            _child: child,
        }
    }

    /// Starts the worker executable with piped stdin/stdout. The child is
    /// killed when the client is dropped.
    pub fn spawn_worker(program: &Path, args: &[String], inherit_stderr: bool) -> Result<Self, BridgeError> {
        let stderr = if inherit_stderr {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("worker stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("worker stdout not captured"))?;
        log_debug!("spawned worker {} (pid {:?})", program.display(), child.id());
        Ok(Self::start(stdout, stdin, Some(child), Vec::new()))
    }

    /// Runs the worker loop on this runtime, connected through an in-memory
    /// pipe.
    pub fn in_process<S>(registry: Arc<BridgeRegistry<S>>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let (client_end, worker_end) = tokio::io::duplex(DUPLEX_BUFFER_BYTES);
        let (worker_read, worker_write) = tokio::io::split(worker_end);
        let server = tokio::spawn(async move {
            if let Err(err) = serve(worker_read, worker_write, registry).await {
                log_error!("in-process worker stopped: {err}");
            }
        });
        let (client_read, client_write) = tokio::io::split(client_end);
        Self::start(client_read, client_write, None, vec![server])
    }

    pub fn is_closed(&self) -> bool {
        self.pending.is_closed()
    }

    /// Sends an untyped call and returns the handler's JSON result.
    pub async fn call_raw(&self, call: BridgeCall) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (waiter, reply) = oneshot::channel();
        if !self.pending.insert(id, waiter) {
            return Err(BridgeError::WorkerExited);
        }
        if self.outgoing.send(RequestFrame { id, call }).is_err() {
            self.pending.remove(id);
            return Err(BridgeError::WorkerExited);
        }
        match reply.await {
            Ok(Outcome::Ok(value)) => Ok(value),
            Ok(Outcome::Err(fault)) => Err(fault.into()),
            Err(_) => Err(BridgeError::WorkerExited),
        }
    }

    pub async fn call<Op: BridgeOperation>(&self, params: Op) -> Result<Op::Response, BridgeError> {
        let value = self.call_raw(params.into()).await?;
        serde_json::from_value(value)
            .map_err(|err| BridgeError::UnexpectedResponse(format!("{}: {err}", Op::EVENT)))
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{BridgeCallEvent, GetErc20AndNftAmountRecipientsForUnshieldToOriginParams};
    use crate::sdk::{SdkError, SdkReply};
    use shade_models::{NetworkName, TxidVersion, UnshieldToOriginRecipients};
    use tokio::io::AsyncReadExt;

    fn recipients_call(txid: &str) -> BridgeCall {
        GetErc20AndNftAmountRecipientsForUnshieldToOriginParams {
            txid_version: TxidVersion::V2PoseidonMerkle,
            network_name: NetworkName::Ethereum,
            railgun_wallet_id: "wallet".to_string(),
            original_shield_txid: txid.to_string(),
        }
        .into()
    }

    #[test]
    fn outcome_wire_shape() {
        let frame = ReplyFrame {
            id: 7,
            outcome: Outcome::Err(BridgeFault::Sdk(SdkError::new("boom"))),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            serde_json::json!({"id": 7, "outcome": {"err": {"kind": "sdk", "message": "boom"}}})
        );
    }

    #[tokio::test]
    async fn serve_answers_bad_frames_and_unregistered_events() {
        let registry: Arc<BridgeRegistry<()>> = Arc::new(BridgeRegistry::new(Arc::new(())));
        let request = RequestFrame {
            id: 2,
            call: recipients_call("0x1"),
        };
        let mut input = String::from("{\"id\": 1, \"call\": {\"event\": \"Nope\"}}\n\nnot json\n");
        input.push_str(&serde_json::to_string(&request).unwrap());
        input.push('\n');

        let (out_write, mut out_read) = tokio::io::duplex(DUPLEX_BUFFER_BYTES);
        serve(input.as_bytes(), out_write, registry).await.unwrap();

        let mut output = String::new();
        out_read.read_to_string(&mut output).await.unwrap();
        let mut replies: Vec<ReplyFrame> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        replies.sort_by_key(|frame| frame.id);
        assert_eq!(replies.len(), 2);
        assert!(matches!(
            replies[0].outcome,
            Outcome::Err(BridgeFault::Codec { .. })
        ));
        assert_eq!(
            replies[1].outcome,
            Outcome::Err(BridgeFault::Unregistered {
                event: BridgeCallEvent::GetErc20AndNftAmountRecipientsForUnshieldToOrigin
            })
        );
    }

    #[tokio::test]
    async fn in_process_client_round_trip() {
        let mut registry: BridgeRegistry<()> = BridgeRegistry::new(Arc::new(()));
        registry.register(
            |_sdk: Arc<()>, params: GetErc20AndNftAmountRecipientsForUnshieldToOriginParams| async move {
                if params.original_shield_txid == "0xbad" {
                    return Err(SdkError::with_code("shield not found", -32000));
                }
                SdkReply::encode(&UnshieldToOriginRecipients::default())
            },
        );
        let client = BridgeClient::in_process(Arc::new(registry));

        let params = GetErc20AndNftAmountRecipientsForUnshieldToOriginParams::try_from(
            recipients_call("0x1"),
        )
        .unwrap();
        let ok = client.call(params).await.unwrap();
        assert_eq!(ok, UnshieldToOriginRecipients::default());

        let err = client.call_raw(recipients_call("0xbad")).await.unwrap_err();
        match err {
            BridgeError::Sdk(err) => {
                assert_eq!(err, SdkError::with_code("shield not found", -32000));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn pending_calls_fail_when_worker_output_closes() {
        let (client_end, worker_end) = tokio::io::duplex(DUPLEX_BUFFER_BYTES);
        let (client_read, client_write) = tokio::io::split(client_end);
        let client = BridgeClient::from_io(client_read, client_write);

        let worker = tokio::spawn(async move {
            let (worker_read, _worker_write) = tokio::io::split(worker_end);
            let mut lines = BufReader::new(worker_read).lines();
            // Read one request, then hang up without answering.
            let _ = lines.next_line().await;
        });

        let err = client.call_raw(recipients_call("0x1")).await.unwrap_err();
        assert!(matches!(err, BridgeError::WorkerExited));
        worker.await.unwrap();
        assert!(client.is_closed());
        let err = client.call_raw(recipients_call("0x2")).await.unwrap_err();
        assert!(matches!(err, BridgeError::WorkerExited));
    }
}
