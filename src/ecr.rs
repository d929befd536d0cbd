//! Retagging of ECR images without pulling them.
//!
//! A tag is added by reading the manifest behind the source tag and putting
//! the same manifest under the target tag. Layers are untouched, which is why
//! both tags have to live in the same repository.

use std::fmt;

use aws_config::Region;
use aws_sdk_ecr::{error::DisplayErrorContext, types::ImageIdentifier};
use log::{debug, info};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Parses `repository:tag` or a bare `tag` completed by `repository`.
    ///
    /// A registry host in front of the repository
    /// (`123456789012.dkr.ecr.eu-west-1.amazonaws.com/app:1.0`) is dropped.
    pub fn resolve(reference: &str, repository: Option<&str>) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidImageReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (named, tag) = match reference.rsplit_once(':') {
            Some((named, tag)) if !tag.contains('/') => (Some(strip_registry(named)), tag),
            Some(_) => return Err(invalid("missing tag")),
            None => (None, reference),
        };
        if tag.is_empty() {
            return Err(invalid("empty tag"));
        }

        let repository = match (named, repository) {
            (Some(""), _) => return Err(invalid("empty repository")),
            (Some(named), Some(flag)) if named != flag => {
                return Err(invalid(&format!("conflicts with repository {flag}")));
            }
            (Some(named), _) => named,
            (None, Some(flag)) if !flag.is_empty() => flag,
            (None, _) => {
                return Err(invalid(
                    "no repository given, use repository:tag or --repository",
                ));
            }
        };

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

fn strip_registry(repository: &str) -> &str {
    match repository.split_once('/') {
        Some((host, rest)) if host.ends_with(".amazonaws.com") => rest,
        _ => repository,
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Image manifest as stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub body: String,
    pub media_type: Option<String>,
}

pub trait ImageRegistry {
    async fn manifest(&self, image: &ImageRef) -> Result<Manifest>;

    async fn put_manifest(&self, image: &ImageRef, manifest: &Manifest) -> Result<()>;
}

pub struct EcrRegistry {
    client: aws_sdk_ecr::Client,
}

impl EcrRegistry {
    pub async fn from_env(profile: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Self {
            client: aws_sdk_ecr::Client::new(&config),
        }
    }
}

impl ImageRegistry for EcrRegistry {
    async fn manifest(&self, image: &ImageRef) -> Result<Manifest> {
        let output = self
            .client
            .batch_get_image()
            .repository_name(&image.repository)
            .image_ids(ImageIdentifier::builder().image_tag(&image.tag).build())
            .send()
            .await
            .map_err(|e| Error::Registry(DisplayErrorContext(e).to_string()))?;

        for failure in output.failures() {
            debug!(
                "BatchGetImage failure for {image}: {:?} {}",
                failure.failure_code(),
                failure.failure_reason().unwrap_or_default()
            );
        }

        let found = output
            .images()
            .iter()
            .find_map(|found| found.image_manifest().map(|body| (found, body)));
        let Some((found, body)) = found else {
            return Err(Error::ImageNotFound {
                repository: image.repository.clone(),
                tag: image.tag.clone(),
            });
        };

        Ok(Manifest {
            body: body.to_string(),
            media_type: found.image_manifest_media_type().map(str::to_string),
        })
    }

    async fn put_manifest(&self, image: &ImageRef, manifest: &Manifest) -> Result<()> {
        self.client
            .put_image()
            .repository_name(&image.repository)
            .image_tag(&image.tag)
            .image_manifest(&manifest.body)
            .set_image_manifest_media_type(manifest.media_type.clone())
            .send()
            .await
            .map_err(|e| Error::Registry(DisplayErrorContext(e).to_string()))?;
        Ok(())
    }
}

/// Points `target` at the image currently tagged `source`.
///
/// # Arguments
///
/// * `registry` - Registry holding both images
/// * `source` - Existing tag whose manifest is copied
/// * `target` - Tag to create or move, in the same repository as `source`
///
/// # Errors
///
/// * `Error::InvalidImageReference` - The two images live in different repositories
/// * `Error::ImageNotFound` - `source` does not exist
/// * `Error::Registry` - A registry call failed
pub async fn retag<R: ImageRegistry>(
    registry: &R,
    source: &ImageRef,
    target: &ImageRef,
) -> Result<()> {
    if source.repository != target.repository {
        return Err(Error::InvalidImageReference {
            reference: target.to_string(),
            reason: format!("must be in repository {}", source.repository),
        });
    }

    let manifest = registry.manifest(source).await?;
    registry.put_manifest(target, &manifest).await?;
    info!("Tag created {target} from {source}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use super::*;

    #[derive(Default)]
    struct MemoryRegistry {
        images: RefCell<HashMap<String, Manifest>>,
    }

    impl MemoryRegistry {
        fn with(image: &str, body: &str) -> Self {
            let registry = Self::default();
            registry.images.borrow_mut().insert(
                image.to_string(),
                Manifest {
                    body: body.to_string(),
                    media_type: Some("application/vnd.oci.image.manifest.v1+json".to_string()),
                },
            );
            registry
        }
    }

    impl ImageRegistry for MemoryRegistry {
        async fn manifest(&self, image: &ImageRef) -> Result<Manifest> {
            self.images
                .borrow()
                .get(&image.to_string())
                .cloned()
                .ok_or_else(|| Error::ImageNotFound {
                    repository: image.repository.clone(),
                    tag: image.tag.clone(),
                })
        }

        async fn put_manifest(&self, image: &ImageRef, manifest: &Manifest) -> Result<()> {
            self.images
                .borrow_mut()
                .insert(image.to_string(), manifest.clone());
            Ok(())
        }
    }

    fn image(repository: &str, tag: &str) -> ImageRef {
        ImageRef {
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }

    #[test]
    fn resolves_repository_and_tag() {
        assert_eq!(ImageRef::resolve("app:1.0", None).unwrap(), image("app", "1.0"));
        assert_eq!(
            ImageRef::resolve("team/app:latest", None).unwrap(),
            image("team/app", "latest")
        );
        assert_eq!(
            ImageRef::resolve("1.0", Some("app")).unwrap(),
            image("app", "1.0")
        );
        assert_eq!(
            ImageRef::resolve("app:1.0", Some("app")).unwrap(),
            image("app", "1.0")
        );
        assert_eq!(
            ImageRef::resolve("123456789012.dkr.ecr.eu-west-1.amazonaws.com/team/app:2", None)
                .unwrap(),
            image("team/app", "2")
        );
    }

    #[test]
    fn rejects_incomplete_references() {
        for (reference, repository) in [
            ("1.0", None),
            ("1.0", Some("")),
            (":1.0", None),
            ("app:", None),
            ("app:1.0", Some("other")),
            ("host:5000/app", None),
        ] {
            assert!(
                matches!(
                    ImageRef::resolve(reference, repository),
                    Err(Error::InvalidImageReference { .. })
                ),
                "{reference} {repository:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn retag_copies_the_manifest() {
        let registry = MemoryRegistry::with("app:1.0", "{\"schemaVersion\":2}");

        retag(&registry, &image("app", "1.0"), &image("app", "stable"))
            .await
            .unwrap();

        let images = registry.images.borrow();
        assert_eq!(images["app:stable"], images["app:1.0"]);
    }

    #[tokio::test]
    async fn retag_of_missing_image_fails() {
        let registry = MemoryRegistry::default();

        let err = retag(&registry, &image("app", "nope"), &image("app", "stable"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ImageNotFound { .. }));
        assert!(registry.images.borrow().is_empty());
    }

    #[tokio::test]
    async fn retag_across_repositories_is_refused() {
        let registry = MemoryRegistry::with("app:1.0", "{}");

        let err = retag(&registry, &image("app", "1.0"), &image("other", "1.0"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidImageReference { .. }));
    }
}
