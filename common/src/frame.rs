//! Splitting of sign payloads into frames.
//!
//! The app receives a sign request as a stream of frames. The first frame only carries the
//! serialized derivation path; the remaining bytes are split in chunks of at most
//! [`CHUNK_SIZE`] bytes. The P1 byte of each command tells the app where the frame sits in the
//! stream.

use thiserror::Error;

use crate::constants::{CHUNK_SIZE, MAX_CONTEXT_LEN};

/// Position of a frame in the stream, sent as P1 of the sign instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkTag {
    /// First frame, carrying the derivation path only.
    Init = 0x00,
    /// Intermediate frame.
    Add = 0x01,
    /// Final frame; the app answers it with the signature.
    Last = 0x02,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: ChunkTag,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(tag: ChunkTag, data: Vec<u8>) -> Self {
        Self { tag, data }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("maximum supported context size is 255 bytes, got {0}")]
    ContextTooLarge(usize),
}

/// Builds the frames of a consensus transaction signature: the path, then
/// `len(context) || context || message`.
pub fn build_sign_frames(
    path: &[u8],
    context: &[u8],
    message: &[u8],
) -> Result<Vec<Frame>, FrameError> {
    if context.len() > MAX_CONTEXT_LEN {
        return Err(FrameError::ContextTooLarge(context.len()));
    }

    let mut buffer = Vec::with_capacity(1 + context.len() + message.len());
    buffer.push(context.len() as u8);
    buffer.extend_from_slice(context);
    buffer.extend_from_slice(message);

    Ok(split_in_frames(path, &buffer))
}

/// Builds the frames of a paratime transaction signature: the path, then `meta || message`.
///
/// The metadata is opaque at this level; it is serialized by the caller.
pub fn build_meta_frames(path: &[u8], meta: &[u8], message: &[u8]) -> Vec<Frame> {
    let mut buffer = Vec::with_capacity(meta.len() + message.len());
    buffer.extend_from_slice(meta);
    buffer.extend_from_slice(message);

    split_in_frames(path, &buffer)
}

fn split_in_frames(path: &[u8], buffer: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(2 + buffer.len() / CHUNK_SIZE);
    frames.push(Frame::new(ChunkTag::Init, path.to_vec()));

    if buffer.is_empty() {
        // the stream must still be closed by a Last frame
        frames.push(Frame::new(ChunkTag::Last, Vec::new()));
        return frames;
    }

    let n_chunks = buffer.len().div_ceil(CHUNK_SIZE);
    for (i, chunk) in buffer.chunks(CHUNK_SIZE).enumerate() {
        let tag = if i + 1 == n_chunks {
            ChunkTag::Last
        } else {
            ChunkTag::Add
        };
        frames.push(Frame::new(tag, chunk.to_vec()));
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::encode_path;

    fn path() -> Vec<u8> {
        encode_path(&[44, 474, 0]).unwrap()
    }

    fn check_tags(frames: &[Frame]) {
        assert!(frames.len() >= 2);
        assert_eq!(frames[0].tag, ChunkTag::Init);
        assert_eq!(frames.last().unwrap().tag, ChunkTag::Last);
        for frame in &frames[1..frames.len() - 1] {
            assert_eq!(frame.tag, ChunkTag::Add);
        }
        for frame in &frames[1..] {
            assert!(frame.data.len() <= CHUNK_SIZE);
        }
    }

    // Concatenates the data frames and strips the length-prefixed context.
    fn reassemble_message(frames: &[Frame]) -> Vec<u8> {
        let buffer: Vec<u8> = frames[1..]
            .iter()
            .flat_map(|f| f.data.iter().copied())
            .collect();
        let context_len = buffer[0] as usize;
        buffer[1 + context_len..].to_vec()
    }

    #[test]
    fn test_first_frame_is_path() {
        let frames = build_sign_frames(&path(), b"ctx", b"msg").unwrap();
        assert_eq!(frames[0], Frame::new(ChunkTag::Init, path()));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].tag, ChunkTag::Last);
        assert_eq!(frames[1].data, b"\x03ctxmsg".to_vec());
    }

    #[test]
    fn test_context_length_prefix() {
        let context = b"oasis-core/consensus: tx for chain testing";
        let frames = build_sign_frames(&path(), context, b"").unwrap();
        assert_eq!(frames[1].data[0] as usize, context.len());

        let frames = build_sign_frames(&path(), b"", b"hello").unwrap();
        assert_eq!(frames[1].data[0], 0x00);
        assert_eq!(reassemble_message(&frames), b"hello".to_vec());
    }

    #[test]
    fn test_context_too_large() {
        let context = vec![b'c'; 256];
        assert_eq!(
            build_sign_frames(&path(), &context, b"msg"),
            Err(FrameError::ContextTooLarge(256))
        );

        let context = vec![b'c'; 255];
        let frames = build_sign_frames(&path(), &context, b"msg").unwrap();
        assert_eq!(frames[1].data[0], 255);
    }

    #[test]
    fn test_message_reassembly() {
        let context = b"oasis-core/consensus: tx for chain testing";
        for len in [0usize, 1, 200, 250, 500, 1000, 1234] {
            let message: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let frames = build_sign_frames(&path(), context, &message).unwrap();
            check_tags(&frames);
            assert_eq!(reassemble_message(&frames), message);
        }
    }

    #[test]
    fn test_no_empty_trailing_chunk() {
        // 1 length byte + 249 bytes of message fill exactly one chunk
        let frames = build_sign_frames(&path(), b"", &[0xaa; 249]).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].data.len(), CHUNK_SIZE);

        // exactly two chunks
        let frames = build_sign_frames(&path(), b"", &[0xaa; 499]).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].tag, ChunkTag::Add);
        assert_eq!(frames[2].tag, ChunkTag::Last);
        assert_eq!(frames[2].data.len(), CHUNK_SIZE);

        // one more byte spills into a third chunk
        let frames = build_sign_frames(&path(), b"", &[0xaa; 500]).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3].data, vec![0xaa]);
    }

    #[test]
    fn test_meta_frames() {
        let meta = vec![0xa2; 300];
        let message = vec![0x11; 100];
        let frames = build_meta_frames(&path(), &meta, &message);
        check_tags(&frames);
        assert_eq!(frames.len(), 3);

        let buffer: Vec<u8> = frames[1..]
            .iter()
            .flat_map(|f| f.data.iter().copied())
            .collect();
        assert_eq!(&buffer[..300], &meta[..]);
        assert_eq!(&buffer[300..], &message[..]);
    }

    #[test]
    fn test_meta_frames_empty_payload() {
        let frames = build_meta_frames(&path(), b"", b"");
        assert_eq!(
            frames,
            vec![
                Frame::new(ChunkTag::Init, path()),
                Frame::new(ChunkTag::Last, vec![])
            ]
        );
    }
}
