use uuid::Uuid;

/// A single-file multipart/form-data body.
pub(crate) struct FilePart {
    boundary: String,
    body: Vec<u8>,
}

impl FilePart {
    pub(crate) fn new(field: &str, file_name: &str, content: &[u8]) -> Self {
        let boundary = format!("----remote-render-{}", Uuid::new_v4().simple());
        // quotes would end the header value early
        let file_name = file_name.replace('"', "_");

        let mut body = Vec::with_capacity(content.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Self { boundary, body }
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }
}
