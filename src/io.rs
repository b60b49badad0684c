//! 임의 위치 읽기/쓰기 추상화
//!
//! 코어가 하는 I/O는 이 두 트레이트뿐이다. 실제 저장소(파일, 메모리 등)는 호출자 몫.

use std::fs::File;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

/// 오프셋 지정 읽기 (송신측 원본)
pub trait ReadAt: Send {
    /// `offset`부터 `buf`를 정확히 채운다
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;
}

/// 오프셋 지정 쓰기 (수신측 대상)
pub trait WriteAt: Send {
    /// `buf` 전체를 `offset`부터 쓴다
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()>;
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::read_exact_at(self, buf, offset)
    }
}

#[cfg(unix)]
impl WriteAt for File {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        std::os::unix::fs::FileExt::write_all_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.seek_read(buf, offset)? {
                0 => return Err(io::ErrorKind::UnexpectedEof.into()),
                n => {
                    let rest = buf;
                    buf = &mut rest[n..];
                    offset += n as u64;
                }
            }
        }
        Ok(())
    }
}

#[cfg(windows)]
impl WriteAt for File {
    fn write_at(&mut self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.seek_write(buf, offset)? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
            }
        }
        Ok(())
    }
}

impl ReadAt for Bytes {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let range = checked_range(offset, buf.len(), self.len())?;
        buf.copy_from_slice(&self[range]);
        Ok(())
    }
}

fn checked_range(offset: u64, len: usize, capacity: usize) -> io::Result<std::ops::Range<usize>> {
    let start = usize::try_from(offset).map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
    match start.checked_add(len) {
        Some(end) if end <= capacity => Ok(start..end),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("범위 초과: offset={offset}, len={len}, capacity={capacity}"),
        )),
    }
}

/// 공유 메모리 버퍼
///
/// 복제한 핸들은 같은 버퍼를 가리킨다. 크기는 고정이며 범위 밖 접근은 에러.
#[derive(Debug, Clone, Default)]
pub struct MemoryObject {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryObject {
    /// 0으로 채운 버퍼 생성
    pub fn new(size: usize) -> Self {
        Self::from_vec(vec![0u8; size])
    }

    /// 기존 데이터로 생성
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// 버퍼 크기
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// 비어있는지
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// 현재 내용 복사본
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl ReadAt for MemoryObject {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let data = self.data.read();
        let range = checked_range(offset, buf.len(), data.len())?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }
}

impl WriteAt for MemoryObject {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        let mut data = self.data.write();
        let range = checked_range(offset, buf.len(), data.len())?;
        data[range].copy_from_slice(buf);
        Ok(())
    }
}
