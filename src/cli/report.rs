//! `list-tags` report: the newest tags of a set of images, read anonymously

use crate::config::TagReportConfig;
use crate::error::Result;
use crate::logging::Logger;
use crate::selector::{TagOrdering, TagSelector};
use crate::transfer::{AuthContext, TransferBackend};

/// Tags found for one image, or why listing failed
#[derive(Debug)]
pub struct ImageTags {
    pub registry: String,
    pub image: String,
    pub tags: Result<Vec<String>>,
}

/// List every image of `config`, keeping the `max` newest tags in natural order
pub async fn collect<B: TransferBackend>(
    backend: &B,
    config: &TagReportConfig,
    max: usize,
) -> Vec<ImageTags> {
    let selector = TagSelector::new::<&str>(&[]).with_ordering(TagOrdering::Natural);
    let mut report = Vec::new();

    for registry in &config.registries {
        for image in &registry.images {
            let tags = backend
                .list_tags(&registry.registry, image, &AuthContext::Anonymous)
                .await
                .map(|tags| selector.select(&tags, max));

            report.push(ImageTags {
                registry: registry.registry.clone(),
                image: image.clone(),
                tags,
            });
        }
    }

    report
}

pub fn print(report: &[ImageTags], output: &Logger) {
    for entry in report {
        let name = format!("{}/{}", entry.registry, entry.image);
        match &entry.tags {
            Ok(tags) if tags.is_empty() => output.info(&format!("{}: No tags found", name)),
            Ok(tags) => output.list(&name, tags),
            Err(e) => output.error(&format!("Failed to list tags for {}: {}", name, e)),
        }
    }
}
