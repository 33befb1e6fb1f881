use bytes::{BufMut, Bytes, BytesMut};
use compressor_http::RequestBody;

/// A part of a `multipart/form-data` body
#[derive(Debug, Clone)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Bytes,
    },
}

/// Builder for a `multipart/form-data` request body
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<MultipartPart>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(format!("----compressor-{}", uuid::Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        });
        self
    }

    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode all parts; quotes and line breaks in names are escaped.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");
            match part {
                MultipartPart::Text { name, value } => {
                    put_disposition(&mut buf, name, None);
                    buf.put_slice(b"\r\n");
                    buf.put_slice(value.as_bytes());
                }
                MultipartPart::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    put_disposition(&mut buf, name, Some(filename));
                    buf.put_slice(b"Content-Type: ");
                    buf.put_slice(content_type.as_bytes());
                    buf.put_slice(b"\r\n\r\n");
                    buf.put_slice(data);
                }
            }
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");
        buf.freeze()
    }

    #[must_use]
    pub fn into_body(self) -> RequestBody {
        RequestBody::Encoded {
            content_type: self.content_type(),
            data: self.encode(),
        }
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

fn put_disposition(buf: &mut BytesMut, name: &str, filename: Option<&str>) {
    buf.put_slice(b"Content-Disposition: form-data; name=\"");
    buf.put_slice(escape(name).as_bytes());
    buf.put_u8(b'"');
    if let Some(filename) = filename {
        buf.put_slice(b"; filename=\"");
        buf.put_slice(escape(filename).as_bytes());
        buf.put_u8(b'"');
    }
    buf.put_slice(b"\r\n");
}

fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
