//! Test doubles: a small statute corpus and a scripted language model.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use nomu_core::law::{
    SOURCE_DECREE, SOURCE_LAW, SOURCE_MIN_WAGE_LAW, SOURCE_RETIREMENT_LAW, SOURCE_RULE,
    SOURCE_SAFETY_LAW,
};
use nomu_core::{ArticleId, EvidenceRecord};
use nomu_store::{EvidenceStore, MemoryStore, SearchRequest, StoreError};

use crate::llm::{LanguageModel, LlmError, Prompt};

pub fn record(source: &str, article: &str, text: &str) -> EvidenceRecord {
    EvidenceRecord {
        text: text.into(),
        source: source.into(),
        article_id: ArticleId::parse(article),
        chapter: String::new(),
        section: String::new(),
        distance: 0.0,
    }
}

fn placed(source: &str, article: &str, chapter: &str, section: &str, text: &str) -> EvidenceRecord {
    EvidenceRecord {
        chapter: chapter.into(),
        section: section.into(),
        ..record(source, article, text)
    }
}

pub fn store_with(records: Vec<EvidenceRecord>) -> MemoryStore {
    MemoryStore::new(records)
}

/// Excerpts of the labor statutes the pipeline tests run against.
pub fn corpus() -> MemoryStore {
    store_with(vec![
        placed(SOURCE_LAW, "제1조", "제1장 총칙", "", "이 법은 헌법에 따라 근로조건의 기준을 정함으로써 근로자의 기본적 생활을 보장, 향상시키며 균형 있는 국민경제의 발전을 꾀하는 것을 목적으로 한다."),
        placed(SOURCE_LAW, "제6조", "제1장 총칙", "", "사용자는 근로자에 대하여 남녀의 성(性)을 이유로 차별적 대우를 하지 못하고, 국적·신앙 또는 사회적 신분을 이유로 근로조건에 대한 차별적 처우를 하지 못한다."),
        placed(SOURCE_LAW, "제23조", "제2장 근로계약", "", "사용자는 근로자에게 정당한 이유 없이 해고, 휴직, 정직, 전직, 감봉, 그 밖의 징벌(懲罰)을 하지 못한다."),
        placed(SOURCE_LAW, "제26조", "제2장 근로계약", "", "사용자는 근로자를 해고(경영상 이유에 의한 해고를 포함한다)하려면 적어도 30일 전에 예고를 하여야 하고, 30일 전에 예고를 하지 아니하였을 때에는 30일분 이상의 통상임금을 지급하여야 한다."),
        placed(SOURCE_LAW, "제27조", "제2장 근로계약", "", "사용자는 근로자를 해고하려면 해고사유와 해고시기를 서면으로 통지하여야 한다. 근로자에 대한 해고는 서면으로 통지하여야 효력이 있다."),
        placed(SOURCE_LAW, "제28조", "제2장 근로계약", "", "사용자가 근로자에게 부당해고등을 하면 근로자는 노동위원회에 구제를 신청할 수 있다. 구제신청은 부당해고등이 있었던 날부터 3개월 이내에 하여야 한다."),
        placed(SOURCE_LAW, "제36조", "제3장 임금", "", "사용자는 근로자가 사망 또는 퇴직한 경우에는 그 지급 사유가 발생한 때부터 14일 이내에 임금, 보상금, 그 밖의 모든 금품을 지급하여야 한다."),
        placed(SOURCE_LAW, "제43조", "제3장 임금", "", "임금은 통화(通貨)로 직접 근로자에게 그 전액을 지급하여야 한다. 임금은 매월 1회 이상 일정한 날짜를 정하여 지급하여야 한다."),
        placed(SOURCE_LAW, "제60조", "제4장 근로시간과 휴식", "", "사용자는 1년간 80퍼센트 이상 출근한 근로자에게 15일의 유급휴가를 주어야 한다."),
        placed(SOURCE_LAW, "제110조", "제12장 벌칙", "벌칙", "제26조, 제36조, 제43조를 위반한 자는 2년 이하의 징역 또는 2천만원 이하의 벌금에 처한다."),
        placed(SOURCE_MIN_WAGE_LAW, "제5조", "제2장 최저임금", "", "최저임금액은 시간·일·주 또는 월을 단위로 하여 정한다. 1년 이상의 기간을 정하여 근로계약을 체결하고 수습 사용 중에 있는 근로자에 대하여는 최저임금액과 다른 금액으로 최저임금액을 정할 수 있다."),
        placed(SOURCE_MIN_WAGE_LAW, "제6조", "제2장 최저임금", "", "사용자는 최저임금의 적용을 받는 근로자에게 최저임금액 이상의 임금을 지급하여야 한다."),
        placed(SOURCE_RETIREMENT_LAW, "제8조", "제2장 퇴직급여제도의 설정", "", "퇴직금제도를 설정하려는 사용자는 계속근로기간 1년에 대하여 30일분 이상의 평균임금을 퇴직금으로 퇴직 근로자에게 지급할 수 있는 제도를 설정하여야 한다."),
        placed(SOURCE_RETIREMENT_LAW, "제9조", "제2장 퇴직급여제도의 설정", "", "사용자는 근로자가 퇴직한 경우에는 그 지급사유가 발생한 날부터 14일 이내에 퇴직금을 지급하여야 한다."),
        placed(SOURCE_SAFETY_LAW, "제52조", "제4장 유해·위험 방지 조치", "", "근로자는 산업재해가 발생할 급박한 위험이 있는 경우에는 작업을 중지하고 대피할 수 있다. 사업주는 작업을 중지하고 대피한 근로자에 대하여 해고나 그 밖의 불리한 처우를 해서는 아니 된다."),
        placed(SOURCE_DECREE, "제6조", "", "", "법 제26조에 따른 해고의 예고는 해고 사유와 해고 시기를 명시하여 하여야 한다."),
        placed(SOURCE_RULE, "제4조", "", "", "법 제26조 단서에서 해고 예고의 예외가 되는 근로자의 귀책사유는 별표와 같다."),
    ])
}

/// Store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl EvidenceStore for FailingStore {
    async fn search(&self, _request: &SearchRequest) -> Result<Vec<EvidenceRecord>, StoreError> {
        Err(StoreError::Other("store unavailable".into()))
    }

    async fn search_by_article_ids(
        &self,
        _ids: &[ArticleId],
        _sources: &[String],
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        Err(StoreError::Other("store unavailable".into()))
    }
}

/// Which pipeline step a prompt belongs to, read from its system text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Classify,
    Checklist,
    Continue,
    Conclude,
}

impl Route {
    fn of(prompt: &Prompt) -> Option<Self> {
        let system = prompt.system.as_str();
        if system.contains("You classify") {
            Some(Self::Classify)
        } else if system.contains("fact-finding checklists") {
            Some(Self::Checklist)
        } else if system.contains("more checklist questions") {
            Some(Self::Continue)
        } else if system.contains("labor-law advisor") {
            Some(Self::Conclude)
        } else {
            None
        }
    }
}

const FAIL: &str = "\u{0}fail";

/// Replies per route, in order; the last reply of a route repeats.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<Vec<(Route, VecDeque<String>)>>,
    calls: Mutex<Vec<(Route, Prompt)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, route: Route, text: &str) -> Self {
        {
            let mut replies = self.replies.lock().unwrap();
            match replies.iter_mut().find(|(r, _)| *r == route) {
                Some((_, queue)) => queue.push_back(text.to_string()),
                None => replies.push((route, VecDeque::from([text.to_string()]))),
            }
        }
        self
    }

    /// The next call on `route` fails with a server error.
    pub fn fail(self, route: Route) -> Self {
        self.reply(route, FAIL)
    }

    pub fn calls(&self, route: Route) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == route)
            .count()
    }

    pub fn prompts(&self, route: Route) -> Vec<Prompt> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == route)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let route = Route::of(prompt).ok_or(LlmError::Empty)?;
        self.calls.lock().unwrap().push((route, prompt.clone()));
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies
                .iter_mut()
                .find(|(r, _)| *r == route)
                .map(|(_, q)| q);
            match queue {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            }
        };
        match reply.as_deref() {
            Some(FAIL) => Err(LlmError::Server {
                status: 500,
                body: "scripted failure".into(),
            }),
            Some(text) => Ok(text.to_string()),
            None => Ok(String::new()),
        }
    }
}
