pub mod cipher;
pub mod handshake;
pub mod nonce;
pub mod record;
pub mod request;

pub use cipher::{Cipher, CipherSuite, KeySchedule};
pub use handshake::{Handshake, HANDSHAKE_LEN};
pub use nonce::NonceSequence;
pub use record::{RecordReader, RecordWriter, MAX_RECORD_LEN};
pub use request::{decode_data, encode_data, ConnectRequest, Destination};
