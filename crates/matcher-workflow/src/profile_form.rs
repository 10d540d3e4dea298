//! 档案表单控制器
//!
//! 持有唯一的档案草稿，负责按用户名加载、保存和删除档案，以及把草稿提交给匹配服务。
//! 所处阶段由进行中的请求推导：加载中为 `Loading`，匹配提交中为 `Submitting`，
//! 其余时间为 `Editing`。加载和匹配各有独立的请求序号，只有最新请求的响应会生效。

use crate::profile_repository::{ProfileDeletion, ProfileRepository};
use matcher_client::MatcherApi;
use matcher_core::{
    ErrorSurfacing, FieldUpdate, Liveness, MatchResponse, MatcherError, NumericPolicy, Profile,
    ProfileDraft, RequestSequencer, RequestToken, Result,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// 按用户名加载时档案不存在的提示
pub const PROFILE_NOT_FOUND_MESSAGE: &str = "Profile not found";

/// 表单阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    Editing,
    Loading,
    Submitting,
}

/// 表单旁的提示条，错误与成功消息互斥
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl Banner {
    fn success(message: impl Into<String>) -> Self {
        Self {
            error: None,
            message: Some(message.into()),
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            message: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.message.is_none()
    }
}

/// 表单行为设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormSettings {
    /// 匹配提交失败的呈现方式
    pub match_errors: ErrorSurfacing,
    /// 档案加载、保存、删除失败的呈现方式
    pub profile_errors: ErrorSurfacing,
    pub numeric_policy: NumericPolicy,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            match_errors: ErrorSurfacing::LoggedOnly,
            profile_errors: ErrorSurfacing::Surfaced,
            numeric_policy: NumericPolicy::SubmitAsIs,
        }
    }
}

#[derive(Debug, Default)]
struct FormInner {
    draft: ProfileDraft,
    banner: Banner,
    save_enabled: bool,
    save_username: String,
    last_submitted: Option<Profile>,
}

/// 档案表单控制器，克隆后共享同一表单
#[derive(Clone)]
pub struct ProfileFormController {
    api: Arc<dyn MatcherApi>,
    repository: ProfileRepository,
    inner: Arc<Mutex<FormInner>>,
    load_seq: Arc<RequestSequencer>,
    match_seq: Arc<RequestSequencer>,
    liveness: Liveness,
    matches: Arc<watch::Sender<Option<MatchResponse>>>,
    settings: FormSettings,
}

impl ProfileFormController {
    pub fn new(api: Arc<dyn MatcherApi>, settings: FormSettings) -> Self {
        let (matches, _) = watch::channel(None);
        Self {
            repository: ProfileRepository::new(Arc::clone(&api)),
            api,
            inner: Arc::new(Mutex::new(FormInner::default())),
            load_seq: Arc::new(RequestSequencer::new("profile-load")),
            match_seq: Arc::new(RequestSequencer::new("match")),
            liveness: Liveness::new(),
            matches: Arc::new(matches),
            settings,
        }
    }

    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    pub fn repository(&self) -> &ProfileRepository {
        &self.repository
    }

    /// 当前草稿的副本
    pub async fn draft(&self) -> ProfileDraft {
        self.inner.lock().await.draft.clone()
    }

    /// 更新单个字段
    pub async fn apply(&self, update: FieldUpdate) {
        debug!("Updating field {}", update.path());
        self.inner.lock().await.draft.apply(update);
    }

    /// 按路径更新字段，例如 `physical.age` 或 `lifestyle.diet`。
    /// 枚举值不在词表内时返回 `Validation`，草稿不变
    pub async fn set_field(&self, path: &str, value: &str) -> Result<()> {
        let update = FieldUpdate::parse(path, value)?;
        self.apply(update).await;
        Ok(())
    }

    /// 整体替换草稿，例如从文件导入的档案
    pub async fn replace_draft(&self, draft: ProfileDraft) {
        self.inner.lock().await.draft = draft;
    }

    /// 恢复默认草稿
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.draft = ProfileDraft::default();
        inner.banner = Banner::default();
    }

    pub fn phase(&self) -> FormPhase {
        if self.load_seq.in_flight() {
            FormPhase::Loading
        } else if self.match_seq.in_flight() {
            FormPhase::Submitting
        } else {
            FormPhase::Editing
        }
    }

    pub async fn banner(&self) -> Banner {
        self.inner.lock().await.banner.clone()
    }

    /// "保存此档案"开关
    pub async fn set_save_enabled(&self, enabled: bool) {
        self.inner.lock().await.save_enabled = enabled;
    }

    pub async fn save_enabled(&self) -> bool {
        self.inner.lock().await.save_enabled
    }

    pub async fn set_save_username(&self, username: impl Into<String>) {
        self.inner.lock().await.save_username = username.into();
    }

    pub async fn save_username(&self) -> String {
        self.inner.lock().await.save_username.clone()
    }

    /// 锁定表单并确认响应仍然有效
    async fn settle(
        &self,
        seq: &RequestSequencer,
        token: RequestToken,
    ) -> Result<MutexGuard<'_, FormInner>> {
        let inner = self.inner.lock().await;
        seq.settle(token);
        if !self.liveness.is_alive() {
            debug!("{}: form torn down, dropping response", seq.slot());
            return Err(MatcherError::StaleResponseIgnored {
                slot: seq.slot(),
                token: token.value(),
                current: token.value(),
            });
        }
        seq.check(token)?;
        Ok(inner)
    }

    fn report(&self, inner: &mut FormInner, policy: ErrorSurfacing, message: String) {
        if policy.is_surfaced() {
            inner.banner = Banner::failure(message);
        } else {
            warn!("{}", message);
        }
    }

    async fn report_now(&self, policy: ErrorSurfacing, message: String) {
        if !self.liveness.is_alive() {
            return;
        }
        let mut inner = self.inner.lock().await;
        self.report(&mut inner, policy, message);
    }

    /// 按用户名加载档案，成功时整体替换草稿。
    /// 档案不存在时草稿保持不变，提示条显示未找到
    pub async fn load(&self, username: &str) -> Result<()> {
        let token = self.load_seq.issue();
        info!("Loading profile {}", username);
        let result = self.repository.load(username).await;

        let mut inner = self.settle(&self.load_seq, token).await?;
        match result {
            Ok(profile) => {
                inner.draft = ProfileDraft::from(&profile);
                inner.banner = Banner::success("Profile loaded successfully");
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    MatcherError::NotFound(_) => {
                        format!("Failed to load profile: {}", PROFILE_NOT_FOUND_MESSAGE)
                    }
                    MatcherError::Validation(m) => m.clone(),
                    other => format!("Failed to load profile: {}", other.detail()),
                };
                self.report(&mut inner, self.settings.profile_errors, message);
                Err(e)
            }
        }
    }

    /// 用保存用户名保存当前草稿。成功后清空用户名并关闭保存开关
    pub async fn save(&self) -> Result<()> {
        let (username, profile) = {
            let inner = self.inner.lock().await;
            (inner.save_username.clone(), inner.draft.coerce())
        };

        let result = self.repository.save(&username, &profile).await;
        if !self.liveness.is_alive() {
            return result;
        }

        let mut inner = self.inner.lock().await;
        match result {
            Ok(()) => {
                inner.banner = Banner::success("Profile saved successfully");
                inner.save_enabled = false;
                inner.save_username.clear();
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    MatcherError::Validation(m) => m.clone(),
                    other => format!("Failed to save profile: {}", other.detail()),
                };
                self.report(&mut inner, self.settings.profile_errors, message);
                Err(e)
            }
        }
    }

    /// 以指定用户名保存
    pub async fn save_as(&self, username: &str) -> Result<()> {
        self.set_save_username(username).await;
        self.save().await
    }

    /// 删除流程第一步：探测档案存在，成功后返回确认凭证
    pub async fn request_delete(&self, username: &str) -> Result<ProfileDeletion> {
        match self.repository.begin_delete(username).await {
            Ok(deletion) => Ok(deletion),
            Err(e) => {
                let message = match &e {
                    MatcherError::NotFound(_) => {
                        format!("No profile found for username \"{}\"", username.trim())
                    }
                    MatcherError::Validation(m) => m.clone(),
                    other => format!("Failed to delete profile: {}", other.detail()),
                };
                self.report_now(self.settings.profile_errors, message).await;
                Err(e)
            }
        }
    }

    /// 确认删除
    pub async fn confirm_delete(&self, deletion: ProfileDeletion) -> Result<()> {
        let username = deletion.username().to_string();
        let result = deletion.confirm().await;
        match &result {
            Ok(()) => {
                if self.liveness.is_alive() {
                    self.inner.lock().await.banner = Banner::success("Profile deleted successfully");
                }
            }
            Err(e) => {
                let message = if e.is_not_found() {
                    format!("Profile \"{}\" no longer exists", username)
                } else {
                    format!("Failed to delete profile: {}", e.detail())
                };
                self.report_now(self.settings.profile_errors, message).await;
            }
        }
        result
    }

    /// 取消删除，不发请求
    pub fn cancel_delete(&self, deletion: ProfileDeletion) {
        deletion.cancel();
    }

    /// 提交当前草稿进行匹配。
    ///
    /// 数值字段宽松解析，无法解析的值按 `numeric_policy` 处理。成功的结果推送给订阅者；
    /// 被更新的提交取代时返回 `StaleResponseIgnored`，已显示的结果不变。
    pub async fn submit_match(&self) -> Result<MatchResponse> {
        let (profile, token) = {
            let mut inner = self.inner.lock().await;
            let profile = inner.draft.coerce();

            let issues = profile.numeric_issues();
            if !issues.is_empty() {
                match self.settings.numeric_policy {
                    NumericPolicy::Block => {
                        let message = format!("Please correct the profile: {}", issues.join("; "));
                        inner.banner = Banner::failure(message.clone());
                        return Err(MatcherError::Validation(message));
                    }
                    NumericPolicy::SubmitAsIs => {
                        warn!("Submitting profile with invalid fields: {}", issues.join("; "));
                    }
                }
            }

            inner.last_submitted = Some(profile.clone());
            (profile, self.match_seq.issue())
        };

        info!("Submitting profile for matching (request {})", token.value());
        let result = self.api.submit_match(&profile).await;

        let mut inner = self.settle(&self.match_seq, token).await?;
        match result {
            Ok(response) => {
                info!("Received {} matches", response.matches.len());
                self.matches.send_replace(Some(response.clone()));
                Ok(response)
            }
            Err(e) => {
                error!("Error submitting profile: {}", e);
                if self.settings.match_errors.is_surfaced() {
                    inner.banner = Banner::failure(format!("Failed to submit profile: {}", e.detail()));
                }
                Err(e)
            }
        }
    }

    /// 订阅匹配结果
    pub fn subscribe_matches(&self) -> watch::Receiver<Option<MatchResponse>> {
        self.matches.subscribe()
    }

    pub fn latest_matches(&self) -> Option<MatchResponse> {
        self.matches.borrow().clone()
    }

    /// 最近一次提交的档案
    pub async fn last_submitted(&self) -> Option<Profile> {
        self.inner.lock().await.last_submitted.clone()
    }

    /// 拆除表单，之后到达的响应全部丢弃
    pub async fn teardown(&self) {
        let _inner = self.inner.lock().await;
        if self.liveness.teardown() {
            debug!("Profile form torn down");
        }
    }
}
