//! 测试用的脚本化服务
//!
//! 每个接口按调用顺序弹出预先排好的应答；`Gated` 应答在测试显式放行前一直挂起，
//! 用来构造"先发后至"的响应顺序。

use async_trait::async_trait;
use matcher_client::{HealthStatus, MatcherApi, UploadResponse};
use matcher_core::{
    MatchResponse, MatcherError, Paper, PaperView, Profile, ProfileDraft, Result, StoredProfile,
    UploadFile,
};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

pub(crate) enum Reply<T> {
    Ready(Result<T>),
    Gated(oneshot::Receiver<Result<T>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T> {
        match self {
            Reply::Ready(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(MatcherError::Internal("gate dropped".to_string()))),
        }
    }
}

pub(crate) fn ok<T>(value: T) -> Reply<T> {
    Reply::Ready(Ok(value))
}

pub(crate) fn fail<T>(error: MatcherError) -> Reply<T> {
    Reply::Ready(Err(error))
}

/// 返回放行端和挂起的应答
pub(crate) fn gate<T>() -> (oneshot::Sender<Result<T>>, Reply<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Reply::Gated(rx))
}

#[derive(Default)]
pub(crate) struct Script {
    pub upload: VecDeque<Reply<UploadResponse>>,
    pub list: VecDeque<Reply<Vec<Paper>>>,
    pub view: VecDeque<Reply<PaperView>>,
    pub delete_paper: VecDeque<Reply<()>>,
    pub matches: VecDeque<Reply<MatchResponse>>,
    pub load: VecDeque<Reply<Profile>>,
    pub save: VecDeque<Reply<()>>,
    pub delete_profile: VecDeque<Reply<()>>,
    pub health: VecDeque<Reply<HealthStatus>>,

    pub calls: Vec<String>,
    pub uploaded: Vec<Vec<String>>,
    pub submitted: Vec<Profile>,
    pub saved: Vec<StoredProfile>,
}

#[derive(Default)]
pub(crate) struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// 记录调用并取出下一条应答，锁在等待应答前释放
    fn next<T>(
        &self,
        call: String,
        queue: impl FnOnce(&mut Script) -> &mut VecDeque<Reply<T>>,
    ) -> Reply<T> {
        let mut script = self.script();
        script.calls.push(call.clone());
        queue(&mut script)
            .pop_front()
            .unwrap_or_else(|| fail(MatcherError::Internal(format!("no reply scripted for {}", call))))
    }
}

#[async_trait]
impl MatcherApi for ScriptedApi {
    async fn upload_papers(&self, files: &[UploadFile]) -> Result<UploadResponse> {
        self.script()
            .uploaded
            .push(files.iter().map(|f| f.file_name.clone()).collect());
        self.next("POST /papers/upload/".to_string(), |s| &mut s.upload)
            .resolve()
            .await
    }

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        self.next("GET /papers".to_string(), |s| &mut s.list).resolve().await
    }

    async fn view_paper(&self, paper_id: &str) -> Result<PaperView> {
        self.next(format!("GET /papers/{}/view", paper_id), |s| &mut s.view)
            .resolve()
            .await
    }

    async fn delete_paper(&self, paper_id: &str) -> Result<()> {
        self.next(format!("DELETE /papers/{}", paper_id), |s| &mut s.delete_paper)
            .resolve()
            .await
    }

    async fn submit_match(&self, profile: &Profile) -> Result<MatchResponse> {
        self.script().submitted.push(profile.clone());
        self.next("POST /match/".to_string(), |s| &mut s.matches)
            .resolve()
            .await
    }

    async fn load_profile(&self, username: &str) -> Result<Profile> {
        self.next(format!("GET /profiles/{}", username), |s| &mut s.load)
            .resolve()
            .await
    }

    async fn save_profile(&self, stored: &StoredProfile) -> Result<()> {
        self.script().saved.push(stored.clone());
        self.next("POST /profiles/save".to_string(), |s| &mut s.save)
            .resolve()
            .await
    }

    async fn delete_profile(&self, username: &str) -> Result<()> {
        self.next(format!("DELETE /profiles/{}", username), |s| &mut s.delete_profile)
            .resolve()
            .await
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.next("GET /health".to_string(), |s| &mut s.health)
            .resolve()
            .await
    }
}

/// 测试用档案
pub(crate) fn sample_profile(age: &str) -> Profile {
    let mut draft = ProfileDraft::default();
    draft.physical.age = age.to_string();
    draft.physical.weight = "150".to_string();
    draft.physical.height = "68".to_string();
    draft.coerce()
}

pub(crate) fn paper(id: &str, title: &str) -> Paper {
    Paper {
        id: id.to_string(),
        title: title.to_string(),
        processed_data: Default::default(),
    }
}

/// 让出执行权，使已派生的任务推进到下一个挂起点
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
