//! An in-process face for tests and demos.
//!
//! A [MemHub] stands in for the forwarding daemon: every face created from
//! the same hub sees the others' interests (multicast, no loopback), and a
//! `put` answers whichever pending interests the data name matches. This
//! is NOT a production transport; it only connects faces within the same
//! process.

use pubsync_api::{
    DynFace, DynInterestHandler, DynRegisterHandler, DynResponseHandler,
    Face, Interest, Name, PsError, PsResult, Publication,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug)]
struct DropAbortHandle {
    name: &'static str,
    handle: tokio::task::AbortHandle,
}

impl Drop for DropAbortHandle {
    fn drop(&mut self) {
        tracing::debug!("aborting: {}", self.name);
        self.handle.abort();
    }
}

type CmdSend = mpsc::UnboundedSender<Cmd>;

enum Cmd {
    Register {
        face_id: u64,
        prefix: Name,
        interests: DynInterestHandler,
        registration: DynRegisterHandler,
    },
    Express {
        face_id: u64,
        interest: Interest,
        response: DynResponseHandler,
    },
    Put {
        face_id: u64,
        data: Publication,
    },
    Expire {
        pending_id: u64,
    },
}

/// A process-local multicast hub connecting [MemHub::face] instances.
#[derive(Debug)]
pub struct MemHub {
    cmd_send: CmdSend,
    next_face: AtomicU64,
    _task: Arc<DropAbortHandle>,
}

impl MemHub {
    /// Create a hub with no faces.
    pub fn create() -> MemHub {
        let (cmd_send, cmd_recv) = mpsc::unbounded_channel();
        let task = tokio::task::spawn(hub_task(cmd_send.clone(), cmd_recv))
            .abort_handle();
        MemHub {
            cmd_send,
            next_face: AtomicU64::new(0),
            _task: Arc::new(DropAbortHandle {
                name: "mem face hub",
                handle: task,
            }),
        }
    }

    /// Create a new face attached to this hub.
    pub fn face(&self) -> DynFace {
        let id = self.next_face.fetch_add(1, Ordering::Relaxed);
        Arc::new(MemFace {
            id,
            cmd_send: self.cmd_send.clone(),
        })
    }
}

#[derive(Debug)]
struct MemFace {
    id: u64,
    cmd_send: CmdSend,
}

impl MemFace {
    fn send(&self, cmd: Cmd) -> PsResult<()> {
        self.cmd_send
            .send(cmd)
            .map_err(|_| PsError::other("mem face hub closed"))
    }
}

impl Face for MemFace {
    fn register_prefix(
        &self,
        prefix: Name,
        interests: DynInterestHandler,
        registration: DynRegisterHandler,
    ) -> PsResult<()> {
        self.send(Cmd::Register {
            face_id: self.id,
            prefix,
            interests,
            registration,
        })
    }

    fn express_interest(
        &self,
        interest: Interest,
        response: DynResponseHandler,
    ) -> PsResult<()> {
        self.send(Cmd::Express {
            face_id: self.id,
            interest,
            response,
        })
    }

    fn put(&self, data: Publication) -> PsResult<()> {
        self.send(Cmd::Put {
            face_id: self.id,
            data,
        })
    }
}

struct Registration {
    face_id: u64,
    prefix: Name,
    interests: DynInterestHandler,
}

struct PendingEntry {
    id: u64,
    face_id: u64,
    interest: Interest,
    response: DynResponseHandler,
}

impl PendingEntry {
    fn matches(&self, data_name: &Name) -> bool {
        self.interest.name == *data_name
            || (self.interest.can_be_prefix
                && self.interest.name.is_prefix_of(data_name))
    }
}

async fn hub_task(
    cmd_send: CmdSend,
    mut cmd_recv: mpsc::UnboundedReceiver<Cmd>,
) {
    let mut registrations: Vec<Registration> = Vec::new();
    let mut pending: Vec<PendingEntry> = Vec::new();
    let mut next_pending: u64 = 0;

    while let Some(cmd) = cmd_recv.recv().await {
        match cmd {
            Cmd::Register {
                face_id,
                prefix,
                interests,
                registration,
            } => {
                tracing::debug!(face_id, %prefix, "register prefix");
                registrations.push(Registration {
                    face_id,
                    prefix: prefix.clone(),
                    interests,
                });
                registration.on_success(&prefix);
            }
            Cmd::Express {
                face_id,
                interest,
                response,
            } => {
                let id = next_pending;
                next_pending += 1;

                let expire_at = interest.lifetime;
                pending.push(PendingEntry {
                    id,
                    face_id,
                    interest: interest.clone(),
                    response,
                });

                let expiry_send = cmd_send.clone();
                tokio::task::spawn(async move {
                    tokio::time::sleep(expire_at).await;
                    let _ = expiry_send.send(Cmd::Expire { pending_id: id });
                });

                // multicast to every other face with a matching prefix
                for reg in &registrations {
                    if reg.face_id != face_id
                        && reg.prefix.is_prefix_of(&interest.name)
                    {
                        reg.interests.on_interest(
                            &reg.prefix,
                            interest.clone(),
                        );
                    }
                }
            }
            Cmd::Put { face_id, data } => {
                let mut satisfied = Vec::new();
                pending.retain(|entry| {
                    if entry.face_id != face_id && entry.matches(data.name())
                    {
                        satisfied.push((
                            entry.interest.clone(),
                            entry.response.clone(),
                        ));
                        false
                    } else {
                        true
                    }
                });
                if satisfied.is_empty() {
                    tracing::debug!(
                        "data {} satisfies no pending interest",
                        data.name()
                    );
                }
                for (interest, response) in satisfied {
                    response.on_data(&interest, data.clone());
                }
            }
            Cmd::Expire { pending_id } => {
                if let Some(pos) =
                    pending.iter().position(|e| e.id == pending_id)
                {
                    let entry = pending.swap_remove(pos);
                    entry.response.on_timeout(&entry.interest);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[derive(Debug)]
    struct CaptureInterests(mpsc::UnboundedSender<Interest>);

    impl pubsync_api::InterestHandler for CaptureInterests {
        fn on_interest(&self, _prefix: &Name, interest: Interest) {
            let _ = self.0.send(interest);
        }
    }

    #[derive(Debug)]
    struct CaptureRegistration(mpsc::UnboundedSender<bool>);

    impl pubsync_api::RegisterHandler for CaptureRegistration {
        fn on_success(&self, _prefix: &Name) {
            let _ = self.0.send(true);
        }
        fn on_failure(&self, _prefix: &Name, _reason: String) {
            let _ = self.0.send(false);
        }
    }

    #[derive(Debug)]
    enum Outcome {
        Data(Publication),
        Timeout,
    }

    #[derive(Debug)]
    struct CaptureResponse(mpsc::UnboundedSender<Outcome>);

    impl pubsync_api::ResponseHandler for CaptureResponse {
        fn on_data(&self, _interest: &Interest, data: Publication) {
            let _ = self.0.send(Outcome::Data(data));
        }
        fn on_nack(&self, _interest: &Interest) {}
        fn on_timeout(&self, _interest: &Interest) {
            let _ = self.0.send(Outcome::Timeout);
        }
    }

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn interest_reaches_other_faces_not_self() {
        let hub = MemHub::create();
        let a = hub.face();
        let b = hub.face();

        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let (reg_tx, mut reg_rx) = mpsc::unbounded_channel();

        a.register_prefix(
            name("/sync"),
            Arc::new(CaptureInterests(a_tx)),
            Arc::new(CaptureRegistration(reg_tx.clone())),
        )
        .unwrap();
        b.register_prefix(
            name("/sync"),
            Arc::new(CaptureInterests(b_tx)),
            Arc::new(CaptureRegistration(reg_tx)),
        )
        .unwrap();
        assert!(reg_rx.recv().await.unwrap());
        assert!(reg_rx.recv().await.unwrap());

        let (resp_tx, _resp_rx) = mpsc::unbounded_channel();
        let mut interest = Interest::new(name("/sync/abc"));
        interest.can_be_prefix = true;
        a.express_interest(interest, Arc::new(CaptureResponse(resp_tx)))
            .unwrap();

        let seen = tokio::time::timeout(
            Duration::from_millis(100),
            b_rx.recv(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(name("/sync/abc"), seen.name);

        // the expressing face must not hear its own interest
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn put_satisfies_pending_interest() {
        let hub = MemHub::create();
        let a = hub.face();
        let b = hub.face();

        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        let mut interest = Interest::new(name("/sync/q"));
        interest.can_be_prefix = true;
        a.express_interest(interest, Arc::new(CaptureResponse(resp_tx)))
            .unwrap();

        let data =
            Publication::new(name("/sync/q/answer"), &b"payload"[..]);
        b.put(data).unwrap();

        match tokio::time::timeout(Duration::from_millis(100), resp_rx.recv())
            .await
            .unwrap()
            .unwrap()
        {
            Outcome::Data(d) => assert_eq!(name("/sync/q/answer"), *d.name()),
            Outcome::Timeout => panic!("expected data"),
        }
    }

    #[tokio::test]
    async fn unanswered_interest_times_out() {
        let hub = MemHub::create();
        let a = hub.face();

        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        let mut interest = Interest::new(name("/sync/q"));
        interest.lifetime = Duration::from_millis(30);
        a.express_interest(interest, Arc::new(CaptureResponse(resp_tx)))
            .unwrap();

        match tokio::time::timeout(Duration::from_millis(200), resp_rx.recv())
            .await
            .unwrap()
            .unwrap()
        {
            Outcome::Timeout => {}
            Outcome::Data(_) => panic!("expected timeout"),
        }
    }
}
