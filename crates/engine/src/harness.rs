//! Test harness: sync engines joined by an in-process face hub.

use crate::{filters, PubsyncConfig, SyncPubsub, UpdateCb};
use pubsync_api::{
    DynResponseHandler, Interest, Name, Publication, ResponseHandler, Signer,
    Timestamp,
};
use pubsync_core::{AcceptAllValidator, MemHub, Sha256Signer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Builds engines that share one [MemHub] and one sync prefix.
pub struct SyncHarness {
    hub: MemHub,
    config: PubsyncConfig,
    sync_prefix: Name,
}

impl SyncHarness {
    /// A harness with the given engine configuration.
    pub fn new(config: PubsyncConfig) -> Self {
        Self {
            hub: MemHub::create(),
            config,
            sync_prefix: "/sync/test".parse().unwrap(),
        }
    }

    /// The shared sync prefix.
    pub fn sync_prefix(&self) -> &Name {
        &self.sync_prefix
    }

    /// A bare face on the shared hub, for injecting traffic by hand.
    pub fn raw_face(&self) -> pubsync_api::DynFace {
        self.hub.face()
    }

    /// A new engine on the shared hub, wired with the reference policy
    /// callbacks and the default signer/validator.
    pub fn engine(&self) -> SyncPubsub {
        SyncPubsub::create(
            self.config.clone(),
            self.hub.face(),
            self.sync_prefix.clone(),
            filters::expired_outside_window(&self.config),
            filters::ours_first_newest(),
            Arc::new(Sha256Signer),
            Arc::new(AcceptAllValidator),
        )
        .unwrap()
    }

    /// A signed publication under `topic` stamped "now".
    pub fn publication(&self, topic: &str, content: &[u8]) -> Publication {
        self.publication_at(topic, content, Timestamp::now())
    }

    /// A signed publication with an explicit timestamp component.
    pub fn publication_at(
        &self,
        topic: &str,
        content: &[u8],
        timestamp: Timestamp,
    ) -> Publication {
        let mut name: Name = topic.parse().unwrap();
        name.push_timestamp(timestamp);
        let mut publication = Publication::new(name, content.to_vec());
        Sha256Signer.sign(&mut publication).unwrap();
        publication
    }

    /// Poll until `engine` knows `publication`, panicking after
    /// `timeout`.
    pub async fn wait_for_known(
        &self,
        engine: &SyncPubsub,
        publication: &Publication,
        timeout: Duration,
    ) {
        tokio::time::timeout(timeout, async {
            while !engine.is_known(publication).await {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!("{} never became known", publication.name())
        });
    }
}

/// A subscription callback that forwards every delivery to a channel.
pub fn capture_subscription(
) -> (UpdateCb, mpsc::UnboundedReceiver<Publication>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let cb: UpdateCb = Arc::new(move |p: &Publication| {
        let _ = tx.send(p.clone());
    });
    (cb, rx)
}

/// What happened to a hand-expressed interest.
#[derive(Debug)]
pub enum ResponseEvent {
    /// Data arrived.
    Data(Publication),
    /// The network refused the interest.
    Nack,
    /// The interest lifetime elapsed unanswered.
    Timeout,
}

#[derive(Debug)]
struct CaptureResponse(mpsc::UnboundedSender<ResponseEvent>);

impl ResponseHandler for CaptureResponse {
    fn on_data(&self, _interest: &Interest, data: Publication) {
        let _ = self.0.send(ResponseEvent::Data(data));
    }
    fn on_nack(&self, _interest: &Interest) {
        let _ = self.0.send(ResponseEvent::Nack);
    }
    fn on_timeout(&self, _interest: &Interest) {
        let _ = self.0.send(ResponseEvent::Timeout);
    }
}

/// A response handler that forwards every outcome to a channel.
pub fn capture_response(
) -> (DynResponseHandler, mpsc::UnboundedReceiver<ResponseEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(CaptureResponse(tx)), rx)
}
