//! # Peg Notifier
//!
//! Versioned snapshots of every peg created by a registry. Each creation
//! publishes the full list; consumers compare versions.

use crate::domain::{Peg, PegError};
use tokio::sync::watch;

/// The list of pegs at one version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PegSnapshot {
    /// Bumped on every published change.
    pub version: u64,
    /// All pegs, in creation order.
    pub pegs: Vec<Peg>,
}

/// Observer of a peg registry's pegs.
#[derive(Clone)]
pub struct PegNotifier {
    rx: watch::Receiver<PegSnapshot>,
}

impl PegNotifier {
    pub(crate) fn new(rx: watch::Receiver<PegSnapshot>) -> Self {
        Self { rx }
    }

    /// Latest snapshot.
    pub fn current(&self) -> PegSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for a snapshot newer than `last_version`.
    ///
    /// Returns immediately if one is already available.
    pub async fn update_since(&mut self, last_version: u64) -> Result<PegSnapshot, PegError> {
        loop {
            {
                let snapshot = self.rx.borrow_and_update();
                if snapshot.version > last_version {
                    return Ok(snapshot.clone());
                }
            }
            self.rx
                .changed()
                .await
                .map_err(|_| PegError::NotifierClosed)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Brand, DenomUri, PegDescriptor, PegId};
    use tokio_test::{assert_pending, assert_ready_ok, task};

    fn peg(id: u64) -> Peg {
        Peg::new(
            PegId(id),
            PegDescriptor {
                alleged_name: format!("peg{}", id),
                local_brand: Brand(id),
                denom_uri: DenomUri::from_validated(format!("ics20-1:p/c/d{}", id)),
            },
        )
    }

    #[tokio::test]
    async fn test_update_since_returns_newer_snapshot() {
        let (tx, rx) = watch::channel(PegSnapshot::default());
        let mut notifier = PegNotifier::new(rx);
        assert_eq!(notifier.current().version, 0);

        tx.send_modify(|s| {
            s.version += 1;
            s.pegs.push(peg(1));
        });
        let snapshot = notifier.update_since(0).await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.pegs, vec![peg(1)]);
    }

    #[test]
    fn test_update_since_waits_for_change() {
        let (tx, rx) = watch::channel(PegSnapshot::default());
        let mut notifier = PegNotifier::new(rx);

        let mut waiter = task::spawn(notifier.update_since(0));
        assert_pending!(waiter.poll());

        tx.send_modify(|s| {
            s.version += 1;
            s.pegs.push(peg(2));
        });
        assert!(waiter.is_woken());
        let snapshot = assert_ready_ok!(waiter.poll());
        assert_eq!(snapshot.pegs.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_registry() {
        let (tx, rx) = watch::channel(PegSnapshot::default());
        let mut notifier = PegNotifier::new(rx);
        drop(tx);
        assert!(matches!(
            notifier.update_since(0).await,
            Err(PegError::NotifierClosed)
        ));
    }
}
