use bytes::{Bytes, BytesMut};

/// Part boundary for the `multipart/x-mixed-replace` frame stream.
pub const BOUNDARY: &[u8] = b"--frame\r\n";
/// Per-part headers. Every part carries a single JPEG image.
pub const PART_HEADERS: &[u8] = b"Content-Type: image/jpeg\r\n\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Content-Type for the stream response itself.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wrap one encoded image into a stream part:
/// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<bytes>\r\n`
pub fn encode_part(image: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(BOUNDARY.len() + PART_HEADERS.len() + image.len() + 2);
    part.extend_from_slice(BOUNDARY);
    part.extend_from_slice(PART_HEADERS);
    part.extend_from_slice(image);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

/// Parse state for the incoming multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--frame\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting image bytes until the next boundary.
    CollectingImage,
}

/// Incremental parser for a `multipart/x-mixed-replace` image stream.
///
/// Feed raw network chunks with [`MultipartParser::push`]; complete images
/// come back in arrival order. Parts may be split across chunks at any byte
/// position, including mid-boundary.
pub struct MultipartParser {
    buffer: BytesMut,
    state: ParseState,
    image_start: usize,
}

impl Default for MultipartParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            image_start: 0,
        }
    }

    /// Append one network chunk and return any images completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut images = Vec::new();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, BOUNDARY) {
                        // Discard everything up to and including the boundary
                        let _ = self.buffer.split_to(pos + BOUNDARY.len());
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case the boundary spans chunks
                        if self.buffer.len() > BOUNDARY.len() {
                            let _ = self.buffer.split_to(self.buffer.len() - BOUNDARY.len());
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        // Discard headers
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.image_start = 0;
                        self.state = ParseState::CollectingImage;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingImage => {
                    // The next boundary marks where the image ends
                    if let Some(pos) = find_subsequence(&self.buffer[self.image_start..], BOUNDARY)
                    {
                        let image_end = self.image_start + pos;
                        // Strip trailing \r\n before the boundary
                        let end = if image_end >= 2
                            && self.buffer[image_end - 2] == b'\r'
                            && self.buffer[image_end - 1] == b'\n'
                        {
                            image_end - 2
                        } else {
                            image_end
                        };

                        let image = Bytes::copy_from_slice(&self.buffer[..end]);

                        // Advance past the boundary
                        let _ = self.buffer.split_to(image_end + BOUNDARY.len());

                        if !image.is_empty() {
                            images.push(image);
                        }

                        // Already past the boundary, go to header parsing
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // No boundary yet, keep accumulating.
                        // Bump image_start to avoid re-scanning old data.
                        self.image_start = if self.buffer.len() > BOUNDARY.len() {
                            self.buffer.len() - BOUNDARY.len()
                        } else {
                            0
                        };
                        break;
                    }
                }
            }
        }

        images
    }
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_roundtrip() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0xFF, 0xD9];
        let part = encode_part(&jpeg);

        let mut parser = MultipartParser::new();
        let mut images = parser.push(&part);
        // The image is only complete once the next boundary arrives
        images.extend(parser.push(BOUNDARY));

        assert_eq!(images.len(), 1);
        assert_eq!(&images[0][..], &jpeg[..]);
    }

    #[test]
    fn part_split_across_chunks() {
        let jpeg = vec![0xAB; 1000];
        let mut wire = encode_part(&jpeg).to_vec();
        wire.extend_from_slice(&encode_part(&jpeg));

        let mut parser = MultipartParser::new();
        let mut images = Vec::new();
        // Feed 7 bytes at a time so every marker is split at some point
        for chunk in wire.chunks(7) {
            images.extend(parser.push(chunk));
        }

        assert_eq!(images.len(), 1);
        assert_eq!(images[0].len(), 1000);
    }

    #[test]
    fn multiple_parts_in_one_chunk() {
        let a = vec![0x01; 64];
        let b = vec![0x02; 64];
        let mut wire = encode_part(&a).to_vec();
        wire.extend_from_slice(&encode_part(&b));
        wire.extend_from_slice(BOUNDARY);

        let mut parser = MultipartParser::new();
        let images = parser.push(&wire);

        assert_eq!(images.len(), 2);
        assert_eq!(&images[0][..], &a[..]);
        assert_eq!(&images[1][..], &b[..]);
    }

    #[test]
    fn garbage_before_first_boundary_ignored() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let mut wire = b"HTTP noise that is not a boundary".to_vec();
        wire.extend_from_slice(&encode_part(&jpeg));
        wire.extend_from_slice(BOUNDARY);

        let mut parser = MultipartParser::new();
        let images = parser.push(&wire);

        assert_eq!(images.len(), 1);
        assert_eq!(&images[0][..], &jpeg[..]);
    }

    #[test]
    fn empty_image_parts_dropped() {
        let mut wire = encode_part(&[]).to_vec();
        wire.extend_from_slice(BOUNDARY);

        let mut parser = MultipartParser::new();
        let images = parser.push(&wire);
        assert!(images.is_empty());
    }
}
