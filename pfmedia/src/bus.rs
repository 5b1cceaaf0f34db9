//! Diffusion des évènements `image-ready` vers les clients SSE
//!
//! Chaque export terminé publie le nom canonique du fichier produit. Les
//! abonnés trop lents perdent les évènements manqués sans être déconnectés.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

const BUS_CAPACITY: usize = 256;

/// Nom de l'évènement SSE
pub const IMAGE_READY_EVENT: &str = "image-ready";

/// Charge utile de `image-ready`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageReady {
    pub exported_filename: String,
}

/// Bus de notifications partagé (clonage peu coûteux)
#[derive(Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<ImageReady>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publie `image-ready` pour `filename`, retourne le nombre d'abonnés atteints
    pub fn publish(&self, filename: impl Into<String>) -> usize {
        let event = ImageReady {
            exported_filename: filename.into(),
        };
        debug!(filename = %event.exported_filename, "image-ready");
        // Aucun abonné : l'évènement est simplement perdu
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(subscribers = count, "subscriber added");
        Subscription {
            rx: self.tx.subscribe(),
            subscribers: self.subscribers.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

/// Abonnement au bus, compté tant qu'il est vivant
pub struct Subscription {
    rx: broadcast::Receiver<ImageReady>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    /// Prochain évènement ; `None` quand le bus est fermé
    pub async fn recv(&mut self) -> Option<ImageReady> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "slow subscriber skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let count = self.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(subscribers = count, "subscriber removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = NotificationBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish("x.jpg"), 2);
        assert_eq!(a.recv().await.unwrap().exported_filename, "x.jpg");
        assert_eq!(b.recv().await.unwrap().exported_filename, "x.jpg");
    }

    #[tokio::test]
    async fn test_subscriber_count_follows_drop() {
        let bus = NotificationBus::new();
        assert_eq!(bus.publish("nobody.jpg"), 0);

        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips() {
        let bus = NotificationBus::new();
        let mut sub = bus.subscribe();
        for i in 0..(BUS_CAPACITY + 10) {
            bus.publish(format!("{}.jpg", i));
        }
        // Les plus anciens sont perdus, la lecture continue
        let first = sub.recv().await.unwrap();
        assert_ne!(first.exported_filename, "0.jpg");
    }

    #[test]
    fn test_payload_shape() {
        let json = serde_json::to_string(&ImageReady {
            exported_filename: "a.jpg".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"exportedFilename":"a.jpg"}"#);
    }
}
