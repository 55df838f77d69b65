use std::sync::Arc;
use std::time::SystemTime;

/// Bytes per pixel of the RGBA buffers produced by the stream manager
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// A captured RGBA frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture sequence number within the manager's lifetime
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: SystemTime,
    /// RGBA pixel data, row-major (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Create a new frame from an RGBA buffer
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    /// Create a frame stamped with the current time
    pub fn from_rgba(id: u64, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(id, SystemTime::now(), data, width, height)
    }

    /// Expected byte length for the declared dimensions
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * RGBA_BYTES_PER_PIXEL
    }

    /// Check the buffer is non-empty, the dimensions positive and the length
    /// consistent with them
    pub fn validate_size(&self) -> bool {
        !self.data.is_empty()
            && self.width > 0
            && self.height > 0
            && self.data.len() == self.expected_size()
    }

    /// Combined R+G+B intensity of the pixel at (x, y)
    pub fn intensity_at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * RGBA_BYTES_PER_PIXEL;
        let px = self.data.get(i..i + 3)?;
        Some(px[0] as u32 + px[1] as u32 + px[2] as u32)
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::from_rgba(1, vec![0u8; 64 * 48 * 4], 64, 48);

        assert_eq!(frame.id, 1);
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.expected_size(), 64 * 48 * 4);
        assert!(frame.validate_size());
    }

    #[test]
    fn test_frame_size_validation() {
        // RGB24-sized buffer is not a valid RGBA frame
        let frame = Frame::from_rgba(1, vec![0u8; 64 * 48 * 3], 64, 48);
        assert!(!frame.validate_size());

        let empty = Frame::from_rgba(2, Vec::new(), 0, 0);
        assert!(!empty.validate_size());

        let zero_height = Frame::from_rgba(3, vec![0u8; 16], 4, 0);
        assert!(!zero_height.validate_size());
    }

    #[test]
    fn test_intensity_at() {
        let mut data = vec![0u8; 4 * 4 * 4];
        let i = (2 * 4 + 1) * 4;
        data[i] = 100;
        data[i + 1] = 50;
        data[i + 2] = 25;
        data[i + 3] = 255; // alpha is ignored
        let frame = Frame::from_rgba(1, data, 4, 4);

        assert_eq!(frame.intensity_at(1, 2), Some(175));
        assert_eq!(frame.intensity_at(0, 0), Some(0));
        assert_eq!(frame.intensity_at(4, 0), None);
    }
}
