//! Radio-link batch framing
//!
//! Frames headed for the telemetry radio are wrapped in batches so the
//! receiver can resynchronise on a noisy serial stream:
//!
//! ```text
//! AA BB CC DD | count: u16 | record * count | EE FF 00 11 | checksum: u16
//! record = id: u32 | len: u8 | data[len] | sequence: u64
//! ```
//!
//! All integers are big-endian. The checksum is the wrapping 16-bit sum of
//! every byte from `count` through the end marker.

use crate::scheduler::BusSink;
use crate::types::{BusError, Frame, LinkError, MAX_FRAME_BYTES};
use async_trait::async_trait;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use tokio::io::AsyncWrite;
use tokio::time::{Duration, Instant};

pub const BATCH_START_MARKER: [u8; 4] = [0xAA, 0xBB, 0xCC, 0xDD];
pub const BATCH_END_MARKER: [u8; 4] = [0xEE, 0xFF, 0x00, 0x11];

/// Bytes in a record besides its data: id + len + sequence
const RECORD_OVERHEAD: usize = 4 + 1 + 8;

/// One frame on the link, tagged with the sender's sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub frame: Frame,
    pub sequence: u64,
}

impl LinkRecord {
    pub fn new(frame: Frame, sequence: u64) -> Self {
        Self { frame, sequence }
    }

    /// Size of this record on the wire
    pub fn encoded_len(&self) -> usize {
        RECORD_OVERHEAD + self.frame.data.len()
    }
}

/// Wrapping byte sum used as the batch checksum
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Serialize records into one batch
pub fn encode_batch(records: &[LinkRecord]) -> Result<Vec<u8>, LinkError> {
    let count =
        u16::try_from(records.len()).map_err(|_| LinkError::TooManyRecords(records.len()))?;

    let body_len: usize = records.iter().map(LinkRecord::encoded_len).sum();
    let mut buffer = Vec::with_capacity(4 + 2 + body_len + 4 + 2);

    buffer.write_all(&BATCH_START_MARKER)?;
    buffer.write_u16::<BigEndian>(count)?;

    for record in records {
        let data = &record.frame.data;
        if data.len() > MAX_FRAME_BYTES {
            return Err(LinkError::FrameTooLong {
                id: record.frame.id,
                len: data.len(),
            });
        }

        buffer.write_u32::<BigEndian>(record.frame.id)?;
        buffer.write_u8(data.len() as u8)?;
        buffer.write_all(data)?;
        buffer.write_u64::<BigEndian>(record.sequence)?;
    }

    buffer.write_all(&BATCH_END_MARKER)?;

    let sum = checksum(&buffer[BATCH_START_MARKER.len()..]);
    buffer.write_u16::<BigEndian>(sum)?;

    Ok(buffer)
}

/// Parse one batch, validating markers, record lengths and checksum
///
/// Bytes after the checksum are ignored.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<LinkRecord>, LinkError> {
    let mut cursor = Cursor::new(bytes);

    let mut marker = [0u8; 4];
    cursor.read_exact(&mut marker)?;
    if marker != BATCH_START_MARKER {
        return Err(LinkError::BadStartMarker);
    }

    let count = cursor.read_u16::<BigEndian>()?;
    let mut records = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let id = cursor.read_u32::<BigEndian>()?;
        let len = cursor.read_u8()? as usize;
        if len > MAX_FRAME_BYTES {
            return Err(LinkError::FrameTooLong { id, len });
        }

        let mut data = vec![0u8; len];
        cursor.read_exact(&mut data)?;
        let sequence = cursor.read_u64::<BigEndian>()?;

        records.push(LinkRecord::new(Frame { id, data }, sequence));
    }

    cursor.read_exact(&mut marker)?;
    if marker != BATCH_END_MARKER {
        return Err(LinkError::BadEndMarker);
    }

    let summed_end = cursor.position() as usize;
    let expected = cursor.read_u16::<BigEndian>()?;
    let actual = checksum(&bytes[BATCH_START_MARKER.len()..summed_end]);
    if expected != actual {
        return Err(LinkError::ChecksumMismatch { expected, actual });
    }

    Ok(records)
}

/// Most records a batch carries before it is sent
pub const MAX_BATCH_RECORDS: usize = 12;

/// Most record bytes a batch carries before it is sent
pub const MAX_BATCH_BYTES: usize = 150;

/// Longest a non-empty batch waits for more frames
pub const BATCH_TIMEOUT: Duration = Duration::from_millis(10);

/// Collects frames between radio transmissions
///
/// Only the newest frame per ID is kept: a fresher reading replaces one that
/// has not been sent yet. A batch is capped by record count and by record
/// bytes, and is due once full or once it has been open for the timeout.
#[derive(Debug)]
pub struct LinkBatcher {
    pending: BTreeMap<u32, LinkRecord>,
    next_sequence: u64,
    replaced: u64,
    max_records: usize,
    max_bytes: usize,
    timeout: Duration,
    opened_at: Option<Instant>,
}

impl Default for LinkBatcher {
    fn default() -> Self {
        Self::with_limits(MAX_BATCH_RECORDS, MAX_BATCH_BYTES, BATCH_TIMEOUT)
    }
}

impl LinkBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_records: usize, max_bytes: usize, timeout: Duration) -> Self {
        Self {
            pending: BTreeMap::new(),
            next_sequence: 0,
            replaced: 0,
            max_records: max_records.max(1),
            max_bytes,
            timeout,
            opened_at: None,
        }
    }

    /// Queue a frame, replacing any unsent frame with the same ID
    ///
    /// Returns false, leaving the batch untouched, when a frame with a new ID
    /// would exceed the record or byte cap.
    pub fn push(&mut self, frame: Frame) -> bool {
        let id = frame.id;
        let size = RECORD_OVERHEAD + frame.data.len();

        if !self.pending.contains_key(&id)
            && !self.pending.is_empty()
            && (self.pending.len() >= self.max_records || self.bytes() + size > self.max_bytes)
        {
            return false;
        }

        let record = LinkRecord::new(frame, self.next_sequence);
        self.next_sequence += 1;

        if self.pending.is_empty() {
            self.opened_at = Some(Instant::now());
        }
        if self.pending.insert(id, record).is_some() {
            self.replaced += 1;
        }
        true
    }

    /// True when the batch is full or has waited out the timeout
    pub fn should_send(&self) -> bool {
        let Some(opened_at) = self.opened_at else {
            return false;
        };

        self.pending.len() >= self.max_records
            || self.bytes() >= self.max_bytes
            || opened_at.elapsed() >= self.timeout
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record bytes currently pending
    pub fn bytes(&self) -> usize {
        self.pending.values().map(LinkRecord::encoded_len).sum()
    }

    /// Frames dropped because a newer one arrived before transmission
    pub fn replaced(&self) -> u64 {
        self.replaced
    }

    /// Encode everything pending into one batch and clear the queue
    ///
    /// Returns `None` when nothing is pending. Records are ordered by ID.
    pub fn take_batch(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let records: Vec<LinkRecord> = std::mem::take(&mut self.pending).into_values().collect();
        self.opened_at = None;
        let batch = encode_batch(&records)?;

        log::debug!("Built link batch: {} records, {} bytes", records.len(), batch.len());
        Ok(Some(batch))
    }
}

/// An encoded batch and how much of it the writer has accepted
///
/// Progress is recorded after every partial write, so a cancelled write
/// resumes where it stopped and the link never carries half a batch followed
/// by the start of another.
#[derive(Debug, Default)]
struct PendingWrite {
    buffer: Vec<u8>,
    written: usize,
}

impl PendingWrite {
    fn is_empty(&self) -> bool {
        self.written >= self.buffer.len()
    }

    fn load(&mut self, batch: Vec<u8>) {
        self.buffer = batch;
        self.written = 0;
    }

    async fn drain<W>(&mut self, writer: &mut W) -> Result<(), BusError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        use tokio::io::AsyncWriteExt;

        while !self.is_empty() {
            let n = writer
                .write(&self.buffer[self.written..])
                .await
                .map_err(|e| BusError(e.to_string()))?;
            if n == 0 {
                return Err(BusError("link writer accepted no bytes".to_string()));
            }
            self.written += n;
        }

        self.buffer.clear();
        self.written = 0;
        writer.flush().await.map_err(|e| BusError(e.to_string()))
    }
}

/// Bus sink that writes every frame to a serial link as a one-record batch
///
/// Cancelling `send` mid-write keeps the unwritten tail; the next `send` or
/// `flush` completes it before anything else goes out.
pub struct LinkSink<W> {
    writer: W,
    next_sequence: u64,
    pending: PendingWrite,
}

impl<W> LinkSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_sequence: 0,
            pending: PendingWrite::default(),
        }
    }

    /// Sequence number the next frame will carry
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// True while part of a batch is still waiting for the writer
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> BusSink for LinkSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        self.pending.drain(&mut self.writer).await?;

        let record = LinkRecord::new(frame.clone(), self.next_sequence);
        let batch = encode_batch(std::slice::from_ref(&record))
            .map_err(|e| BusError(e.to_string()))?;

        self.pending.load(batch);
        self.next_sequence += 1;
        self.pending.drain(&mut self.writer).await
    }

    async fn flush(&mut self) -> Result<(), BusError> {
        self.pending.drain(&mut self.writer).await
    }
}

/// Bus sink that groups frames into multi-record batches
///
/// Frames collect in a [`LinkBatcher`]; a batch goes out when it is full or on
/// the first `send` after it has been open for the batch timeout. `flush`
/// sends whatever is waiting. Writes are resumable the same way as
/// [`LinkSink`].
pub struct BatchingLinkSink<W> {
    writer: W,
    batcher: LinkBatcher,
    pending: PendingWrite,
    batches: u64,
}

impl<W> BatchingLinkSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self::with_batcher(writer, LinkBatcher::new())
    }

    pub fn with_batcher(writer: W, batcher: LinkBatcher) -> Self {
        Self {
            writer,
            batcher,
            pending: PendingWrite::default(),
            batches: 0,
        }
    }

    /// Batches handed to the writer so far
    pub fn batches_sent(&self) -> u64 {
        self.batches
    }

    pub fn batcher(&self) -> &LinkBatcher {
        &self.batcher
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn send_batch(&mut self) -> Result<(), BusError> {
        if let Some(batch) = self.batcher.take_batch().map_err(|e| BusError(e.to_string()))? {
            self.pending.load(batch);
            self.batches += 1;
        }
        self.pending.drain(&mut self.writer).await
    }
}

#[async_trait]
impl<W> BusSink for BatchingLinkSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        self.pending.drain(&mut self.writer).await?;

        if !self.batcher.push(frame.clone()) {
            self.send_batch().await?;
            self.batcher.push(frame.clone());
        }

        if self.batcher.should_send() {
            self.send_batch().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), BusError> {
        self.pending.drain(&mut self.writer).await?;
        self.send_batch().await
    }
}
