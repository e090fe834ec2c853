//! Wire codec for the priority task broker.
//!
//! Every logical message is authenticated with a keyed tag computed over
//! its canonical JSON form, then the tagged structure is encrypted whole
//! under an authenticated symmetric cipher. See [`codec`] for the framing
//! details and [`message`] for the typed verb set.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod key;
pub mod message;
pub mod tag;

pub use codec::FRAME_CAP;
pub use error::{ProtocolError, Result};
pub use key::SecretKey;
pub use message::{Reply, Request};
