//! Attachment resolution & validation (§3 `Attachment`, §8 invariant 7: a
//! rejected attachment fails fast before any HTTP request is issued).

use crate::config::AttachmentLimits;
use crate::error::AgentError;
use crate::turn::ContentPart;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};

const IMAGE_MIME_BY_EXT: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
];

#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub path: PathBuf,
    pub bytes: u64,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub bytes: u64,
    pub mime: &'static str,
    pub data_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedAttachments {
    pub files: Vec<FileAttachment>,
    pub images: Vec<ImageAttachment>,
}

fn limit_or_unlimited(value: Option<u64>) -> u64 {
    match value {
        Some(0) | None => u64::MAX,
        Some(v) => v,
    }
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    IMAGE_MIME_BY_EXT
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, m)| *m)
}

/// Resolves and validates `--file`/`--image` paths against the configured
/// limits. Fails on the first violation so no network call is ever made
/// with an invalid attachment set (§8 invariant 7).
pub fn resolve_attachments(
    file_paths: &[String],
    image_paths: &[String],
    limits: &AttachmentLimits,
) -> Result<ResolvedAttachments, AgentError> {
    let max_files = limit_or_unlimited(limits.max_files);
    let max_images = limit_or_unlimited(limits.max_images);
    let max_file_bytes = limit_or_unlimited(limits.max_file_bytes);
    let max_image_bytes = limit_or_unlimited(limits.max_image_bytes);

    if (file_paths.len() as u64) > max_files {
        return Err(AgentError::AttachmentTooManyFiles(format!(
            "{} files exceeds limit of {}",
            file_paths.len(),
            max_files
        )));
    }
    if (image_paths.len() as u64) > max_images {
        return Err(AgentError::AttachmentTooManyImages(format!(
            "{} images exceeds limit of {}",
            image_paths.len(),
            max_images
        )));
    }

    let mut files = Vec::with_capacity(file_paths.len());
    for raw in file_paths {
        let path = std::fs::canonicalize(raw)
            .map_err(|_| AgentError::AttachmentNotFound(raw.clone()))?;
        let metadata =
            std::fs::metadata(&path).map_err(|_| AgentError::AttachmentNotFound(raw.clone()))?;
        if metadata.len() > max_file_bytes {
            return Err(AgentError::AttachmentTooLarge(format!(
                "{} is {} bytes, limit is {}",
                raw,
                metadata.len(),
                max_file_bytes
            )));
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|_| AgentError::AttachmentUnreadable(raw.clone()))?;
        files.push(FileAttachment {
            path,
            bytes: metadata.len(),
            content,
        });
    }

    let mut images = Vec::with_capacity(image_paths.len());
    for raw in image_paths {
        let path = std::fs::canonicalize(raw)
            .map_err(|_| AgentError::AttachmentNotFound(raw.clone()))?;
        let mime = image_mime(&path)
            .ok_or_else(|| AgentError::AttachmentTypeUnsupported(raw.clone()))?;
        let metadata =
            std::fs::metadata(&path).map_err(|_| AgentError::AttachmentNotFound(raw.clone()))?;
        if metadata.len() > max_image_bytes {
            return Err(AgentError::AttachmentTooLarge(format!(
                "{} is {} bytes, limit is {}",
                raw,
                metadata.len(),
                max_image_bytes
            )));
        }
        let bytes = std::fs::read(&path).map_err(|_| AgentError::AttachmentUnreadable(raw.clone()))?;
        let data_url = format!("data:{};base64,{}", mime, BASE64.encode(&bytes));
        images.push(ImageAttachment {
            path,
            bytes: metadata.len(),
            mime,
            data_url,
        });
    }

    Ok(ResolvedAttachments { files, images })
}

/// Builds the ordered content parts for the initial user message (§4.I
/// init step 2): text, then a fenced block per file, then a labeled
/// `image_url` part per image.
pub fn build_user_message_parts(text: &str, attachments: &ResolvedAttachments) -> Vec<ContentPart> {
    if attachments.files.is_empty() && attachments.images.is_empty() {
        return vec![ContentPart::Text(text.to_string())];
    }

    let mut parts = vec![ContentPart::Text(text.to_string())];
    for file in &attachments.files {
        parts.push(ContentPart::Text(format!(
            "\n\nFile: {}\n```\n{}\n```",
            file.path.display(),
            file.content
        )));
    }
    for image in &attachments.images {
        parts.push(ContentPart::Text(format!(
            "\n\nImage: {}",
            image.path.display()
        )));
        parts.push(ContentPart::ImageUrl(image.data_url.clone()));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_files: Option<u64>, max_file_bytes: Option<u64>) -> AttachmentLimits {
        AttachmentLimits {
            max_files,
            max_images: None,
            max_file_bytes,
            max_image_bytes: None,
        }
    }

    #[test]
    fn resolves_readable_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();
        let resolved = resolve_attachments(
            &[path.to_string_lossy().to_string()],
            &[],
            &limits(None, None),
        )
        .unwrap();
        assert_eq!(resolved.files.len(), 1);
        assert_eq!(resolved.files[0].content, "hello");
    }

    #[test]
    fn missing_file_fails_fast() {
        let result = resolve_attachments(&["/no/such/file".to_string()], &[], &limits(None, None));
        assert!(matches!(result, Err(AgentError::AttachmentNotFound(_))));
    }

    #[test]
    fn too_many_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x").unwrap();
        let result = resolve_attachments(
            &[path.to_string_lossy().to_string(), path.to_string_lossy().to_string()],
            &[],
            &limits(Some(1), None),
        );
        assert!(matches!(result, Err(AgentError::AttachmentTooManyFiles(_))));
    }

    #[test]
    fn oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "0123456789").unwrap();
        let result = resolve_attachments(
            &[path.to_string_lossy().to_string()],
            &[],
            &limits(None, Some(5)),
        );
        assert!(matches!(result, Err(AgentError::AttachmentTooLarge(_))));
    }

    #[test]
    fn unsupported_image_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bmp");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();
        let result = resolve_attachments(&[], &[path.to_string_lossy().to_string()], &limits(None, None));
        assert!(matches!(result, Err(AgentError::AttachmentTypeUnsupported(_))));
    }
}
