//! 슬라이스 파일 코덱과 k-way 병합.
//!
//! 레코드 형식: `[timestamp: i64 BE][duration: i64 BE]` 고정 16바이트.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use perfseries_core::error::CoreError;
use perfseries_core::models::sample::Sample;
use tracing::debug;

/// 레코드 하나의 바이트 수
pub const RECORD_SIZE: usize = 16;

/// 샘플 목록을 파일 하나로 기록 (순서 그대로)
pub fn write_samples(path: &Path, samples: &[Sample]) -> Result<(), CoreError> {
    let file = File::create(path).map_err(|e| CoreError::file_io(path, e))?;
    let mut writer = BufWriter::new(file);
    for sample in samples {
        write_record(&mut writer, sample).map_err(|e| CoreError::file_io(path, e))?;
    }
    writer.flush().map_err(|e| CoreError::file_io(path, e))?;
    Ok(())
}

fn write_record(writer: &mut impl Write, sample: &Sample) -> std::io::Result<()> {
    writer.write_all(&sample.timestamp.to_be_bytes())?;
    writer.write_all(&sample.duration.to_be_bytes())
}

/// 슬라이스 파일 순차 리더
pub struct SampleFileReader {
    reader: BufReader<File>,
    path: PathBuf,
    done: bool,
}

impl SampleFileReader {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let file = File::open(path).map_err(|e| CoreError::file_io(path, e))?;
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            done: false,
        })
    }

    /// 다음 레코드. 파일 끝이면 None, 잘린 레코드면 에러.
    pub fn next_sample(&mut self) -> Result<Option<Sample>, CoreError> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(CoreError::file_io(
                        &self.path,
                        std::io::Error::new(
                            ErrorKind::UnexpectedEof,
                            format!("잘린 레코드 ({filled}/{RECORD_SIZE} 바이트)"),
                        ),
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CoreError::file_io(&self.path, e)),
            }
        }

        let (ts, dur) = buf.split_at(8);
        Ok(Some(Sample::new(
            u64::from_be_bytes(ts.try_into().unwrap_or_default()),
            u64::from_be_bytes(dur.try_into().unwrap_or_default()),
        )))
    }
}

impl Iterator for SampleFileReader {
    type Item = Result<Sample, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_sample() {
            Ok(Some(sample)) => Some(Ok(sample)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// 정렬된 슬라이스 파일들을 하나의 정렬된 파일로 병합
///
/// 각 슬라이스의 선두를 힙에 두고 가장 작은 타임스탬프를 반복해서 꺼낸다.
/// 같은 타임스탬프는 슬라이스 번호 순. 기록한 레코드 수를 반환한다.
pub fn merge_sorted_files(inputs: &[PathBuf], output: &Path) -> Result<u64, CoreError> {
    let mut readers = inputs
        .iter()
        .map(|p| SampleFileReader::open(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut heads = BinaryHeap::with_capacity(readers.len());
    for (idx, reader) in readers.iter_mut().enumerate() {
        if let Some(sample) = reader.next_sample()? {
            heads.push(Reverse((sample.timestamp, idx, sample.duration)));
        }
    }

    let file = File::create(output).map_err(|e| CoreError::file_io(output, e))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    while let Some(Reverse((timestamp, idx, duration))) = heads.pop() {
        write_record(&mut writer, &Sample::new(timestamp, duration))
            .map_err(|e| CoreError::file_io(output, e))?;
        written += 1;

        if let Some(next) = readers[idx].next_sample()? {
            heads.push(Reverse((next.timestamp, idx, next.duration)));
        }
    }

    writer.flush().map_err(|e| CoreError::file_io(output, e))?;
    debug!(
        "슬라이스 병합: {}개 파일 → {} ({}건)",
        inputs.len(),
        output.display(),
        written
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_all(path: &Path) -> Vec<Sample> {
        SampleFileReader::open(path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn write_and_read_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.ser");
        let samples = vec![Sample::new(1, 10), Sample::new(u64::MAX >> 1, 0)];

        write_samples(&path, &samples).unwrap();
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            (samples.len() * RECORD_SIZE) as u64
        );
        assert_eq!(read_all(&path), samples);
    }

    #[test]
    fn truncated_record_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.ser");
        std::fs::write(&path, [0u8; RECORD_SIZE + 3]).unwrap();

        let mut reader = SampleFileReader::open(&path).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next().unwrap(),
            Err(CoreError::FileIo { .. })
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn merge_interleaves_slices() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("0.ser");
        let b = temp.path().join("1.ser");
        let c = temp.path().join("2.ser");
        write_samples(&a, &[Sample::new(1, 0), Sample::new(4, 0), Sample::new(9, 0)]).unwrap();
        write_samples(&b, &[Sample::new(2, 1), Sample::new(4, 1)]).unwrap();
        write_samples(&c, &[]).unwrap();

        let out = temp.path().join("total.ser");
        let written = merge_sorted_files(&[a, b, c], &out).unwrap();
        assert_eq!(written, 5);

        let merged: Vec<_> = read_all(&out)
            .into_iter()
            .map(|s| (s.timestamp, s.duration))
            .collect();
        // 같은 타임스탬프(4)는 슬라이스 번호 순
        assert_eq!(merged, vec![(1, 0), (2, 1), (4, 0), (4, 1), (9, 0)]);
    }

    #[test]
    fn merge_without_inputs_creates_empty_file() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("total.ser");
        assert_eq!(merge_sorted_files(&[], &out).unwrap(), 0);
        assert!(out.exists());
        assert!(read_all(&out).is_empty());
    }
}
