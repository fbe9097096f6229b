// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Collects paginated AWS responses.

use crate::error::Result;
use std::future::Future;

/// Fetches every page of a paginated operation and concatenates the items.
///
/// `fetch` is called with the token of the page to fetch (`None` for the
/// first page) and returns the items of that page together with the token of
/// the next one. An empty or missing token ends the iteration.
pub async fn drain_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>)>>,
{
    let mut items = vec![];
    let mut token: Option<String> = None;
    loop {
        let (page, next_token) = fetch(token).await?;
        items.extend(page);
        match next_token {
            Some(x) if !x.is_empty() => token = Some(x),
            _ => break,
        }
    }
    Ok(items)
}
