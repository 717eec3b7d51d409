pub mod download;
pub mod error;
pub mod fetch;
pub mod repair;
pub mod search;
pub mod song;
pub mod soundtrack;

pub use download::{download, download_files, file_list, DownloadOptions, DownloadReport};
pub use error::HyliaError;
pub use fetch::Site;
pub use search::search;
pub use song::{Song, SongDetails};
pub use soundtrack::{Soundtrack, SoundtrackContents};
