#![allow(dead_code)]

use lazyarray_core::{ArraySource, DType, SourceError};
use ndarray::{ArrayD, IxDyn};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn assert_close(actual: &ArrayD<f64>, expected: &ArrayD<f64>) {
    assert_eq!(actual.shape(), expected.shape());
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() <= 1e-12 * e.abs().max(1.0), "{} != {}", a, e);
    }
}

/// A source whose every read fails with an I/O error.
#[derive(Debug)]
pub struct FailingSource {
    pub shape: Vec<usize>,
}

impl ArraySource for FailingSource {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn dtype(&self) -> DType {
        DType::Float64
    }

    fn read_data(&self, _region: &[Range<usize>]) -> Result<ArrayD<f64>, SourceError> {
        Err(Box::new(io::Error::new(io::ErrorKind::Other, "device not ready")))
    }
}

/// A 2-d `float64` matrix stored row-major as little-endian bytes on disk.
/// Records the largest number of elements fetched by a single read.
#[derive(Debug)]
pub struct FileMatrix {
    file: Mutex<File>,
    shape: Vec<usize>,
    pub largest_read: AtomicUsize,
    pub reads: AtomicUsize,
}

impl FileMatrix {
    pub fn create(path: &Path, rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> io::Result<Self> {
        let mut file = File::create(path)?;
        for i in 0..rows {
            for j in 0..cols {
                file.write_all(&f(i, j).to_le_bytes())?;
            }
        }
        file.sync_all()?;
        Ok(Self {
            file: Mutex::new(File::open(path)?),
            shape: vec![rows, cols],
            largest_read: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        })
    }
}

impl ArraySource for FileMatrix {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn dtype(&self) -> DType {
        DType::Float64
    }

    fn read_data(&self, region: &[Range<usize>]) -> Result<ArrayD<f64>, SourceError> {
        let (rows, cols) = (region[0].clone(), region[1].clone());
        let mut out = Vec::with_capacity(rows.len() * cols.len());
        let mut buf = vec![0u8; cols.len() * 8];
        let mut file = self.file.lock().map_err(|e| e.to_string())?;
        for row in rows.clone() {
            file.seek(SeekFrom::Start(((row * self.shape[1] + cols.start) * 8) as u64))?;
            file.read_exact(&mut buf)?;
            out.extend(buf.chunks_exact(8).map(|b| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(b);
                f64::from_le_bytes(bytes)
            }));
        }
        self.largest_read.fetch_max(out.len(), Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(ArrayD::from_shape_vec(IxDyn(&[rows.len(), cols.len()]), out)?)
    }
}
