use crate::domain::MessageText;
use std::collections::HashSet;
use uuid::Uuid;

const DEFAULT_URL: &str = "/";
const DEFAULT_TAG: &str = "notification";

/// JSON body accepted by the push delivery endpoint.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequestBody {
    pub title: Option<String>,
    pub body: Option<String>,
    pub user_id: Option<Uuid>,
    pub user_ids: Option<Vec<Uuid>>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    pub notification_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushTargets {
    Single(Uuid),
    Many(Vec<Uuid>),
}

impl PushTargets {
    pub fn user_ids(&self) -> Vec<Uuid> {
        match self {
            PushTargets::Single(user_id) => vec![*user_id],
            PushTargets::Many(user_ids) => user_ids.clone(),
        }
    }
}

/// Drops repeated ids, keeping the first occurrence of each.
fn distinct(user_ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(user_ids.len());
    user_ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub title: MessageText,
    pub body: MessageText,
    pub targets: PushTargets,
    pub url: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    pub notification_id: Option<Uuid>,
}

impl TryFrom<PushRequestBody> for PushRequest {
    type Error = String;

    fn try_from(request: PushRequestBody) -> Result<Self, Self::Error> {
        let title = MessageText::parse("title", request.title.unwrap_or_default())?;
        let body = MessageText::parse("body", request.body.unwrap_or_default())?;
        let targets = match (request.user_id, request.user_ids) {
            (Some(user_id), None) => PushTargets::Single(user_id),
            (None, Some(user_ids)) if !user_ids.is_empty() => PushTargets::Many(distinct(user_ids)),
            (None, Some(_)) => return Err("'userIds' must not be empty.".into()),
            (Some(_), Some(_)) => {
                return Err("Provide either 'userId' or 'userIds', not both.".into())
            }
            (None, None) => return Err("Either 'userId' or 'userIds' is required.".into()),
        };
        Ok(Self {
            title,
            body,
            targets,
            url: request.url,
            image: request.image,
            tag: request.tag,
            notification_id: request.notification_id,
        })
    }
}

/// What a device's service worker receives.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub icon: &'a str,
    pub url: &'a str,
    pub tag: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<Uuid>,
}

impl PushRequest {
    pub fn payload<'a>(&'a self, icon: &'a str) -> PushPayload<'a> {
        PushPayload {
            title: self.title.as_ref(),
            body: self.body.as_ref(),
            icon,
            url: self.url.as_deref().unwrap_or(DEFAULT_URL),
            tag: self.tag.as_deref().unwrap_or(DEFAULT_TAG),
            image: self.image.as_deref(),
            notification_id: self.notification_id,
        }
    }
}
