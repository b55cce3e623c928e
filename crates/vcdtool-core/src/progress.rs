//! Upload progress probing.
//!
//! [`get_upload_progress`] is a single best-effort probe. The waiting loop
//! lives in [`wait_for_completion`], which the flows and the CLI call with a
//! [`PollPolicy`].

use tracing::debug;

use crate::error::Result;
use crate::poll::{poll_until, PollPolicy};
use crate::session::Transport;
use crate::xml::{parse_document, XmlElement};

/// Percentage at which an upload is finished.
pub const COMPLETE: u32 = 100;

/// Entity `status` values meaning the object is resolved and usable:
/// 1 (resolved) for media, 8 (powered off) for vApp templates.
const RESOLVED_STATUSES: [&str; 2] = ["1", "8"];

fn find_progress(root: &XmlElement) -> Option<u32> {
    let element = root
        .descendants()
        .find(|e| e.name.local.ends_with("Progress"))?;
    let text = element.text.as_deref()?.trim();
    let value = text
        .parse::<u32>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(|v| v.max(0.0).round() as u32))?;
    Some(value.min(COMPLETE))
}

/// Extract the progress percentage from a status document.
///
/// Returns the text of the first descendant whose tag ends with `Progress`,
/// or `None` when there is no such element or the document does not parse.
pub fn progress_from_document(xml: &str) -> Option<u32> {
    let root = parse_document(xml).ok()?;
    find_progress(&root)
}

/// Probe the upload progress of the entity at `href`.
///
/// Returns 0 when the request fails, the status is not 200, or the document
/// has no progress element.
pub fn get_upload_progress(transport: &dyn Transport, href: &str) -> u32 {
    probe(transport, href, progress_from_document)
}

/// Progress reading used while waiting: a finished entity drops its
/// transfer task, so a resolved `status` without a progress element counts
/// as complete.
fn completion_from_document(xml: &str) -> Option<u32> {
    let root = parse_document(xml).ok()?;
    find_progress(&root).or_else(|| {
        root.attr("status")
            .filter(|s| RESOLVED_STATUSES.contains(s))
            .map(|_| COMPLETE)
    })
}

fn probe(transport: &dyn Transport, href: &str, extract: fn(&str) -> Option<u32>) -> u32 {
    match transport.get(href) {
        Ok(response) if response.status == 200 => extract(&response.body).unwrap_or(0),
        Ok(response) => {
            debug!(status = response.status, %href, "progress probe returned non-200");
            0
        }
        Err(e) => {
            debug!(error = %e, %href, "progress probe failed");
            0
        }
    }
}

/// Poll `href` until it reports 100%.
///
/// `on_progress` is called with every reading. Fails with a timeout once
/// the policy's attempt budget is exhausted.
pub fn wait_for_completion<F>(
    transport: &dyn Transport,
    href: &str,
    policy: &PollPolicy,
    mut on_progress: F,
) -> Result<u32>
where
    F: FnMut(u32),
{
    poll_until(policy, "upload progress", |attempt| {
        let progress = probe(transport, href, completion_from_document);
        debug!(attempt, progress, %href, "upload progress");
        on_progress(progress);
        Ok((progress >= COMPLETE).then_some(progress))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_from_task_document() {
        let xml = r#"<Media xmlns="http://www.vmware.com/vcloud/v1.5" status="0">
            <Tasks><Task status="running"><Progress>42</Progress></Task></Tasks>
        </Media>"#;
        assert_eq!(progress_from_document(xml), Some(42));
    }

    #[test]
    fn test_progress_suffix_match() {
        let xml = r#"<Root><Task><UploadProgress>7</UploadProgress></Task></Root>"#;
        assert_eq!(progress_from_document(xml), Some(7));
    }

    #[test]
    fn test_first_progress_wins() {
        let xml = r#"<Root><A><Progress>10</Progress></A><B><Progress>90</Progress></B></Root>"#;
        assert_eq!(progress_from_document(xml), Some(10));
    }

    #[test]
    fn test_missing_progress() {
        let xml = r#"<Media xmlns="http://www.vmware.com/vcloud/v1.5" status="0"/>"#;
        assert_eq!(progress_from_document(xml), None);
        assert_eq!(progress_from_document("not xml"), None);
    }

    #[test]
    fn test_non_numeric_progress() {
        let xml = r#"<Root><Task><Progress>soon</Progress></Task></Root>"#;
        assert_eq!(progress_from_document(xml), None);
    }

    #[test]
    fn test_fractional_progress_is_rounded() {
        let xml = r#"<Root><Task><Progress>49.6</Progress></Task></Root>"#;
        assert_eq!(progress_from_document(xml), Some(50));
    }

    #[test]
    fn test_resolved_status_counts_as_complete() {
        let media = r#"<Media xmlns="http://www.vmware.com/vcloud/v1.5" status="1"/>"#;
        assert_eq!(completion_from_document(media), Some(COMPLETE));

        let template = r#"<VAppTemplate xmlns="http://www.vmware.com/vcloud/v1.5" status="8"/>"#;
        assert_eq!(completion_from_document(template), Some(COMPLETE));

        let pending = r#"<VAppTemplate xmlns="http://www.vmware.com/vcloud/v1.5" status="0"/>"#;
        assert_eq!(completion_from_document(pending), None);
    }
}
