//! Platform document-picker boundary. The host supplies the real picker;
//! the core only cares about cancel-vs-picked and the picked file's path.

use async_trait::async_trait;

use crate::error::ChatResult;
use crate::types::PickResult;

#[async_trait]
pub trait DocumentPicker: Send + Sync {
    async fn pick(&self) -> ChatResult<PickResult>;
}
