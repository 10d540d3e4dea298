//! 批量上传
//!
//! 一批文件合并为一次multipart请求提交，服务端的逐文件结果被归约为与提交顺序一致的结果列表。
//! 请求整体失败时只产生一条合成的错误结果。

use matcher_client::{MatcherApi, UploadResponse};
use matcher_core::{
    Liveness, MatcherError, RequestSequencer, Result, UploadFile, UploadOutcome, UploadResult,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct UploadState {
    selection: Vec<UploadFile>,
    // 每次重新选择递增，用于判断结算时的选择是否仍是提交时那一批
    generation: u64,
    results: Vec<UploadResult>,
}

/// 上传编排器，克隆后共享同一会话
#[derive(Clone)]
pub struct UploadOrchestrator {
    api: Arc<dyn MatcherApi>,
    state: Arc<Mutex<UploadState>>,
    sequencer: Arc<RequestSequencer>,
    liveness: Liveness,
}

impl UploadOrchestrator {
    pub fn new(api: Arc<dyn MatcherApi>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(UploadState::default())),
            sequencer: Arc::new(RequestSequencer::new("upload")),
            liveness: Liveness::new(),
        }
    }

    /// 替换当前选择的文件，上传进行中也允许重新选择
    pub async fn select(&self, files: Vec<UploadFile>) {
        debug!("Selected {} file(s) for upload", files.len());
        let mut state = self.state.lock().await;
        state.selection = files;
        state.generation += 1;
    }

    /// 当前选择的文件名
    pub async fn selection(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .selection
            .iter()
            .map(|f| f.file_name.clone())
            .collect()
    }

    /// 最近一次被采用的上传结果
    pub async fn results(&self) -> Vec<UploadResult> {
        self.state.lock().await.results.clone()
    }

    /// 最新一次上传是否仍在进行
    pub fn is_uploading(&self) -> bool {
        self.sequencer.in_flight()
    }

    /// 上传当前选择的文件
    pub async fn submit(&self) -> Result<Option<Vec<UploadResult>>> {
        let (files, generation) = {
            let state = self.state.lock().await;
            (state.selection.clone(), state.generation)
        };
        self.upload(files, generation).await
    }

    /// 上传一批文件。
    ///
    /// 空批次不发请求，返回 `Ok(None)`。被更新的上传取代时返回 `StaleResponseIgnored`，
    /// 此时结果和文件选择都保持不变。上传期间重新选择的文件在结算后保留。
    pub async fn submit_files(&self, files: Vec<UploadFile>) -> Result<Option<Vec<UploadResult>>> {
        let generation = self.state.lock().await.generation;
        self.upload(files, generation).await
    }

    async fn upload(
        &self,
        files: Vec<UploadFile>,
        generation: u64,
    ) -> Result<Option<Vec<UploadResult>>> {
        if files.is_empty() {
            debug!("Empty selection, nothing to upload");
            return Ok(None);
        }

        let token = self.sequencer.issue();
        let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
        info!("Uploading {} file(s): {}", names.len(), names.join(", "));

        let results = match self.api.upload_papers(&files).await {
            Ok(response) => aggregate(response, &names),
            Err(e) => {
                error!("Upload request failed: {}", e);
                vec![UploadResult::upload_error(e.to_string())]
            }
        };

        let mut state = self.state.lock().await;
        self.sequencer.settle(token);
        if !self.liveness.is_alive() {
            debug!("Upload session closed, dropping results");
            return Err(MatcherError::StaleResponseIgnored {
                slot: self.sequencer.slot(),
                token: token.value(),
                current: token.value(),
            });
        }
        self.sequencer.check(token)?;

        let succeeded = results.iter().filter(|r| r.success).count();
        info!("Upload settled: {}/{} succeeded", succeeded, results.len());
        state.results = results.clone();
        if state.generation == generation {
            state.selection.clear();
        } else {
            debug!("Selection changed during upload, keeping it");
        }
        Ok(Some(results))
    }

    /// 拆除会话，之后到达的结果全部丢弃
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        self.liveness.teardown();
        *state = UploadState::default();
    }
}

/// 把服务端响应归约为每个提交文件一条结果，顺序与提交顺序一致
pub fn aggregate(response: UploadResponse, names: &[String]) -> Vec<UploadResult> {
    let mut slots: Vec<Option<UploadOutcome>> = vec![None; names.len()];

    match response {
        UploadResponse::List(outcomes) => {
            if outcomes.len() > names.len() {
                warn!(
                    "Service returned {} outcomes for {} files, ignoring extras",
                    outcomes.len(),
                    names.len()
                );
            }
            for (slot, outcome) in slots.iter_mut().zip(outcomes) {
                *slot = Some(outcome);
            }
        }
        UploadResponse::Keyed(mut outcomes) => {
            for (slot, name) in slots.iter_mut().zip(names) {
                *slot = outcomes.remove(name);
            }
            if !outcomes.is_empty() {
                let unknown: Vec<&String> = outcomes.keys().collect();
                warn!("Service returned outcomes for unknown files: {:?}", unknown);
            }
        }
        UploadResponse::Single(outcome) => {
            if names.len() > 1 {
                warn!("Service returned a single outcome for {} files", names.len());
            }
            if let Some(slot) = slots.first_mut() {
                *slot = Some(outcome);
            }
        }
    }

    slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| match slot {
            Some(mut outcome) => {
                if outcome.title.trim().is_empty() {
                    outcome.title = name.clone();
                }
                UploadResult::from(outcome)
            }
            None => UploadResult::missing(name),
        })
        .collect()
}
