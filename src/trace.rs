use std::{
    fs,
    io::{self, BufRead, BufReader, Read},
    path::PathBuf,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use thiserror::Error;
use xz2::read::XzDecoder;

/// Trace record kind codes, as they appear in the trace text.
const CODE_DATA_LOAD: u32 = 0;
const CODE_DATA_STORE: u32 = 1;
const CODE_INST_LOAD: u32 = 2;
/// Reserved codes for annotation records; replayed as no-ops.
const CODE_MARKERS: [u32; 2] = [3, 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    DataLoad,
    DataStore,
    InstLoad,
    Marker,
}

impl AccessKind {
    fn from_code(code: u32) -> Option<Self> {
        match code {
            CODE_DATA_LOAD => Some(AccessKind::DataLoad),
            CODE_DATA_STORE => Some(AccessKind::DataStore),
            CODE_INST_LOAD => Some(AccessKind::InstLoad),
            c if CODE_MARKERS.contains(&c) => Some(AccessKind::Marker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub kind: AccessKind,
    pub addr: u32,
}

impl TraceRecord {
    /// Parses one `<kind> <hex-address>` trace line. `None` for anything
    /// that is not exactly a kind code and a 32-bit hex address.
    pub fn parse(text: &str) -> Option<TraceRecord> {
        let mut fields = text.split_whitespace();
        let kind = AccessKind::from_code(fields.next()?.parse().ok()?)?;
        let digits = fields.next()?;
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let addr = u32::from_str_radix(digits, 16).ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(TraceRecord { kind, addr })
    }
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("reading trace: {0}")]
    Io(#[from] io::Error),
    #[error("trace line {line}: malformed record {text:?}")]
    Malformed { line: u64, text: String },
}

/// A trace file being parsed on a background thread. Batches of records
/// arrive over a bounded channel; the replay itself stays on the caller's
/// thread, one record at a time. A `.xz` path is decompressed on the fly.
pub struct Trace {
    pub rec: Receiver<Result<Vec<TraceRecord>, TraceError>>,
    _thread: JoinHandle<()>,
}

impl Trace {
    pub fn open(
        path: PathBuf,
        records_per_batch: usize,
        batches_per_queue: usize,
    ) -> io::Result<Trace> {
        let stream = fs::File::open(&path)?;
        let reader: Box<dyn Read + Send> = if path.extension().is_some_and(|ext| ext == "xz") {
            Box::new(XzDecoder::new(stream))
        } else {
            Box::new(stream)
        };
        let (sender, receiver) = crossbeam::channel::bounded(batches_per_queue);

        let t = thread::spawn(move || Trace::run_thread(reader, records_per_batch, sender));

        Ok(Trace {
            rec: receiver,
            _thread: t,
        })
    }

    fn run_thread(
        reader: Box<dyn Read + Send>,
        records_per_batch: usize,
        queue: Sender<Result<Vec<TraceRecord>, TraceError>>,
    ) {
        let mut batch = Vec::with_capacity(records_per_batch);
        let mut line_no = 0;
        for read in BufReader::new(reader).lines() {
            line_no += 1;
            let text = match read {
                Ok(text) => text,
                Err(err) => {
                    let _ = queue.send(Err(err.into()));
                    return;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            match TraceRecord::parse(&text) {
                Some(record) => batch.push(record),
                None => {
                    let _ = queue.send(Err(TraceError::Malformed { line: line_no, text }));
                    return;
                }
            }
            if batch.len() == records_per_batch {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(records_per_batch));
                if queue.send(Ok(full)).is_err() {
                    // receiver dropped, stop reading
                    return;
                }
            }
        }
        if !batch.is_empty() {
            let _ = queue.send(Ok(batch));
        }
    }
}
