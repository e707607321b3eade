//! Recording real-world payments against a trip.

pub mod recorder;
pub mod store;

pub use recorder::{PaymentRecorder, RecordError};
pub use store::{InMemoryPaymentStore, PaymentStore, StoreError};
