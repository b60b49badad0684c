//! 전송 객체 정의
//!
//! - Object: 전송되는 논리 파일 (id + 전체 크기)
//! - 완료 판정: 디코딩이 끝난 청크들이 객체 전체 범위를 덮는지 확인

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;

/// 전송 객체
///
/// `(id, size)` 전체가 식별자이므로 맵 키로 그대로 사용한다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Object {
    /// 객체 ID
    pub id: String,

    /// 전체 크기 (바이트)
    pub size: u64,
}

impl Object {
    /// 새 객체 생성
    pub fn new(id: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            size,
        }
    }

    /// 완료된 청크들이 `[0, size)`를 빈틈없이 덮는지 확인
    ///
    /// 다른 객체의 청크는 무시한다. 청크 순서, 중복, 겹침은 상관없다.
    pub fn is_completed_by<'a, I>(&self, finished_chunks: I) -> bool
    where
        I: IntoIterator<Item = &'a Chunk>,
    {
        if self.size == 0 {
            return true;
        }

        let mut ranges: Vec<(u64, u64)> = finished_chunks
            .into_iter()
            .filter(|chunk| chunk.object.id == self.id)
            .map(|chunk| (chunk.offset, chunk.end()))
            .collect();
        ranges.sort_by_key(|&(offset, _)| offset);

        let mut cursor = 0;
        for (offset, end) in ranges {
            if offset > cursor {
                // 다음 청크가 인접하거나 겹치지 않음
                return false;
            }
            cursor = cursor.max(end);
            if cursor == self.size {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, offset: u64, size: u64) -> Chunk {
        Chunk::new(Object::new(id, 1000), offset, size, 10)
    }

    fn object() -> Object {
        Object::new("o1", 1000)
    }

    #[test]
    fn test_simple_complete() {
        let chunks = [chunk("o1", 500, 500), chunk("o1", 0, 500)];
        assert!(object().is_completed_by(&chunks));
    }

    #[test]
    fn test_simple_incomplete() {
        let chunks = [chunk("o1", 500, 450), chunk("o1", 0, 500)];
        assert!(!object().is_completed_by(&chunks));
    }

    #[test]
    fn test_overlapping_complete() {
        let chunks = [
            chunk("o1", 100, 200),
            chunk("o1", 50, 950),
            chunk("o1", 0, 200),
        ];
        assert!(object().is_completed_by(&chunks));
    }

    #[test]
    fn test_overlapping_incomplete() {
        let chunks = [
            chunk("o1", 100, 200),
            chunk("o1", 50, 850),
            chunk("o1", 0, 200),
        ];
        assert!(!object().is_completed_by(&chunks));
    }

    #[test]
    fn test_duplicated_offsets_complete() {
        let chunks = [
            chunk("o1", 100, 200),
            chunk("o1", 50, 300),
            chunk("o1", 50, 900),
            chunk("o1", 50, 500),
            chunk("o1", 0, 200),
            chunk("o1", 900, 100),
        ];
        assert!(object().is_completed_by(&chunks));
    }

    #[test]
    fn test_trailing_edge_incomplete() {
        let chunks = [chunk("o1", 500, 499), chunk("o1", 0, 500)];
        assert!(!object().is_completed_by(&chunks));
    }

    #[test]
    fn test_ignores_other_objects() {
        let chunks = [chunk("o2", 500, 500), chunk("o1", 0, 500)];
        assert!(!object().is_completed_by(&chunks));
    }

    #[test]
    fn test_gap_at_start() {
        let chunks = [chunk("o1", 1, 999)];
        assert!(!object().is_completed_by(&chunks));
    }

    #[test]
    fn test_no_chunks() {
        let none: Vec<Chunk> = Vec::new();
        assert!(!object().is_completed_by(&none));
        assert!(Object::new("empty", 0).is_completed_by(&none));
    }
}
