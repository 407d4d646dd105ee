#![forbid(unsafe_code)]

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::cipher::Cipher;
use crate::codec::nonce::NonceSequence;
use crate::error::{ConnError, ConnResult};

/// Maximum ciphertext-plus-tag length the decoder accepts, per spec §4.1:
/// "the decoder refuses lengths exceeding 64 KiB."
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// One direction of the AEAD record layer: wire shape `u16 length (BE) ||
/// ciphertext || 16-byte tag`, sealed/opened with a per-direction nonce
/// sequence (spec §4.1 "Record wire shape").
pub struct RecordWriter {
    cipher: Cipher,
    nonces: NonceSequence,
}

impl RecordWriter {
    pub fn new(cipher: Cipher) -> Self {
        Self { cipher, nonces: NonceSequence::new() }
    }

    pub async fn write_record<W: AsyncWrite + Unpin>(
        &mut self,
        writer: &mut W,
        plaintext: &[u8],
    ) -> ConnResult<()> {
        let nonce = self.nonces.next()?;
        let sealed = self.cipher.seal(&nonce, plaintext)?;
        if sealed.len() > MAX_RECORD_LEN {
            return Err(ConnError::BadFraming(format!(
                "record of {} bytes exceeds the 64 KiB cap",
                sealed.len()
            )));
        }
        let len = sealed.len() as u16;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(&sealed).await?;
        Ok(())
    }
}

pub struct RecordReader {
    cipher: Cipher,
    nonces: NonceSequence,
}

impl RecordReader {
    pub fn new(cipher: Cipher) -> Self {
        Self { cipher, nonces: NonceSequence::new() }
    }

    pub async fn read_record<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> ConnResult<Vec<u8>> {
        let mut len_buf = [0u8; 2];
        reader.read_exact(&mut len_buf).await?;
        let len = u16::from_be_bytes(len_buf) as usize;
        if len > MAX_RECORD_LEN {
            return Err(ConnError::BadFraming(format!(
                "record of {len} bytes exceeds the 64 KiB cap"
            )));
        }
        let mut ciphertext = vec![0u8; len];
        reader.read_exact(&mut ciphertext).await?;
        let nonce = self.nonces.next()?;
        self.cipher.open(&nonce, &ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::cipher::{CipherSuite, KeySchedule};

    #[tokio::test]
    async fn writer_and_reader_agree_on_nonce_sequence() {
        let keys = KeySchedule::derive(b"shared-secret", CipherSuite::ChaCha20Poly1305);
        let mut writer = RecordWriter::new(keys.cipher());
        let mut reader = RecordReader::new(keys.cipher());

        let mut buf = Vec::new();
        writer.write_record(&mut buf, b"hello").await.unwrap();
        writer.write_record(&mut buf, b"world").await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(reader.read_record(&mut cursor).await.unwrap(), b"hello");
        assert_eq!(reader.read_record(&mut cursor).await.unwrap(), b"world");
    }

    #[tokio::test]
    async fn truncated_record_body_surfaces_as_io_error() {
        let keys = KeySchedule::derive(b"shared-secret", CipherSuite::ChaCha20Poly1305);
        let mut reader = RecordReader::new(keys.cipher());
        // A length prefix promising more bytes than follow.
        let mut framed = Vec::new();
        framed.extend_from_slice(&100u16.to_be_bytes());
        framed.extend_from_slice(&[0u8; 10]);
        let mut cursor = std::io::Cursor::new(framed);
        let err = reader.read_record(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ConnError::Io(_)));
    }
}
