//! 档案仓库客户端
//!
//! 对外部档案存储的加载、保存和删除。删除分两步：先用加载探测档案存在，
//! 得到 [`ProfileDeletion`] 确认凭证后，只有 `confirm` 会真正发出删除请求。

use matcher_client::MatcherApi;
use matcher_core::{MatcherError, Profile, Result, StoredProfile};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 保存时未填写用户名的提示
pub const EMPTY_USERNAME_MESSAGE: &str = "Please enter a username to save the profile";

/// 档案仓库
#[derive(Clone)]
pub struct ProfileRepository {
    api: Arc<dyn MatcherApi>,
}

impl ProfileRepository {
    pub fn new(api: Arc<dyn MatcherApi>) -> Self {
        Self { api }
    }

    /// 加载档案。服务端任何非2xx响应都按 `NotFound` 处理，`Transport` 保持原样
    pub async fn load(&self, username: &str) -> Result<Profile> {
        let username = require_username(username, "Please enter a username to load the profile")?;
        debug!("Loading profile {}", username);
        let profile = self.fetch(username).await?;
        info!("Loaded profile {}", username);
        Ok(profile)
    }

    async fn fetch(&self, username: &str) -> Result<Profile> {
        self.api.load_profile(username).await.map_err(|e| match e {
            MatcherError::Http { status, detail } => {
                debug!("Profile {} lookup returned {}: {}", username, status, detail);
                MatcherError::NotFound(format!("Profile {} not found", username))
            }
            other => other,
        })
    }

    /// 保存档案。用户名为空时返回 `Validation` 且不发请求，服务端拒绝时返回 `Save`
    pub async fn save(&self, username: &str, profile: &Profile) -> Result<()> {
        let username = require_username(username, EMPTY_USERNAME_MESSAGE)?;
        let stored = StoredProfile {
            username: username.to_string(),
            profile: profile.clone(),
        };

        self.api.save_profile(&stored).await.map_err(|e| {
            warn!("Failed to save profile {}: {}", username, e);
            MatcherError::Save(e.detail())
        })?;
        info!("Saved profile {}", username);
        Ok(())
    }

    /// 删除流程第一步：确认档案存在。
    ///
    /// 档案不存在时返回 `NotFound`，不会得到确认凭证，也就不可能发出删除请求。
    pub async fn begin_delete(&self, username: &str) -> Result<ProfileDeletion> {
        let username = require_username(username, "Please enter a username to delete the profile")?;
        self.fetch(username).await.map_err(|e| {
            debug!("Existence probe for {} failed: {}", username, e);
            e
        })?;

        Ok(ProfileDeletion {
            repository: self.clone(),
            username: username.to_string(),
        })
    }

    async fn delete(&self, username: &str) -> Result<()> {
        match self.api.delete_profile(username).await {
            Ok(()) => {
                info!("Deleted profile {}", username);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!("Profile {} disappeared before deletion", username);
                Err(e)
            }
            Err(e) => {
                warn!("Failed to delete profile {}: {}", username, e);
                Err(MatcherError::Delete(e.detail()))
            }
        }
    }
}

fn require_username<'a>(username: &'a str, message: &str) -> Result<&'a str> {
    let username = username.trim();
    if username.is_empty() {
        Err(MatcherError::Validation(message.to_string()))
    } else {
        Ok(username)
    }
}

/// 删除确认凭证，只能由存在性探测成功后得到
#[must_use = "a deletion does nothing until confirmed"]
pub struct ProfileDeletion {
    repository: ProfileRepository,
    username: String,
}

impl ProfileDeletion {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// 确认对话框的提示文本
    pub fn message(&self) -> String {
        format!(
            "Are you sure you want to delete the profile \"{}\"?",
            self.username
        )
    }

    /// 确认删除，这是发出删除请求的唯一途径
    pub async fn confirm(self) -> Result<()> {
        self.repository.delete(&self.username).await
    }

    /// 取消删除，不产生任何请求
    pub fn cancel(self) {
        debug!("Deletion of profile {} cancelled", self.username);
    }
}

impl std::fmt::Debug for ProfileDeletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileDeletion")
            .field("username", &self.username)
            .finish()
    }
}
