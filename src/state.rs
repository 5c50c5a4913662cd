use crate::config::AppConfig;
use crate::images::services::ImagePipeline;
use crate::storage::{AssetStore, LocalDiskStorage};
use crate::users::repo::{self, UserRepo};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub images: Arc<ImagePipeline>,
}

impl AppState {
    /// Startup: reads the environment, connects the configured user store
    /// and prepares the upload directory.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let users = repo::connect(&config.database).await?;
        Self::from_parts(config, users).await
    }

    pub async fn from_parts(config: AppConfig, users: Arc<dyn UserRepo>) -> anyhow::Result<Self> {
        let disk =
            LocalDiskStorage::new(&config.images.upload_dir, &config.images.public_prefix).await?;
        info!(
            upload_dir = %disk.root().display(),
            public_prefix = %config.images.public_prefix,
            optimize = config.images.optimize,
            "image intake ready"
        );
        let storage = Arc::new(disk) as Arc<dyn AssetStore>;
        let images = Arc::new(ImagePipeline::new(storage, &config.images));

        Ok(Self {
            config: Arc::new(config),
            users,
            images,
        })
    }

    /// Teardown: releases the store's connections. Call once after the
    /// server has stopped accepting requests.
    pub async fn shutdown(&self) {
        self.users.close().await;
        info!(backend = self.users.backend(), "user store closed");
    }

    #[cfg(test)]
    pub async fn fake(root: &std::path::Path) -> Self {
        Self::fake_with(root, crate::config::ImageConfig::default()).await
    }

    #[cfg(test)]
    pub async fn fake_with(root: &std::path::Path, images: crate::config::ImageConfig) -> Self {
        use crate::config::{DatabaseConfig, ImageConfig, StoreBackend};
        use crate::users::memory::MemoryUserRepo;

        let config = AppConfig {
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 1,
                mongo_uri: None,
                mongo_database: "test".into(),
            },
            images: ImageConfig {
                upload_dir: root.join("uploads"),
                ..images
            },
        };
        Self::from_parts(config, Arc::new(MemoryUserRepo::default()))
            .await
            .expect("fake state")
    }
}
