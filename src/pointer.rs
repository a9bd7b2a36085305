use std::cmp;
use std::fmt;
use std::hash;

#[derive(Debug, Copy, Clone)]
/// A segment:offset far pointer.
pub struct Pointer {
    pub segment: u16,
    pub offset: u16,
}

impl Pointer {
    /// The linear address `segment * 16 + offset`.
    pub fn abs(&self) -> u32 {
        self.segment as u32 * 16 + self.offset as u32
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.segment, self.offset)
    }
}

impl cmp::Ord for Pointer {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.abs().cmp(&other.abs())
    }
}

impl cmp::PartialOrd for Pointer {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Two pointers are equal when they name the same linear address, even if
// their segment and offset differ (0001:0000 == 0000:0010).
impl cmp::PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        self.abs() == other.abs()
    }
}

impl cmp::Eq for Pointer {}

impl hash::Hash for Pointer {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.abs().hash(state);
    }
}

#[test]
fn test_pointer_abs() {
    assert_eq!(Pointer { segment: 0, offset: 0 }.abs(), 0);
    assert_eq!(Pointer { segment: 1, offset: 2 }.abs(), 0x12);
    assert_eq!(Pointer { segment: 0xffff, offset: 0xffff }.abs(), 0x10ffef);
    assert_eq!(Pointer { segment: 1, offset: 0 }, Pointer { segment: 0, offset: 16 });
    assert_eq!(format!("{}", Pointer { segment: 0x12, offset: 0xabc }), "0012:0abc");
}
