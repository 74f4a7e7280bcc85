//! Prometheus counters for the business events worth watching.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Login attempts, labelled `success` or `failure`
    pub logins: IntCounterVec,
    pub cards_created: IntCounter,
    /// Card status changes, labelled with the new status
    pub card_transitions: IntCounterVec,
    pub uploads: IntCounter,
    pub upload_bytes: IntCounter,
}

impl Metrics {
    pub fn new(namespace: &str) -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some(namespace.to_string()), None)?;

        let logins = IntCounterVec::new(
            Opts::new("logins_total", "Login attempts by outcome"),
            &["outcome"],
        )?;
        let cards_created = IntCounter::new("id_cards_created_total", "ID cards created")?;
        let card_transitions = IntCounterVec::new(
            Opts::new("id_card_transitions_total", "ID card status changes by new status"),
            &["status"],
        )?;
        let uploads = IntCounter::new("uploads_total", "Files uploaded")?;
        let upload_bytes = IntCounter::new("upload_bytes_total", "Bytes uploaded")?;

        registry.register(Box::new(logins.clone()))?;
        registry.register(Box::new(cards_created.clone()))?;
        registry.register(Box::new(card_transitions.clone()))?;
        registry.register(Box::new(uploads.clone()))?;
        registry.register(Box::new(upload_bytes.clone()))?;

        Ok(Self {
            registry,
            logins,
            cards_created,
            card_transitions,
            uploads,
            upload_bytes,
        })
    }

    pub fn record_login(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.logins.with_label_values(&[outcome]).inc();
    }

    /// Text exposition format
    pub fn render(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_else(|_| "Error encoding metrics".to_string())
    }
}
