mod client;

pub use client::{
    ApiErrorClass, Corpora, DriveClient, DriveError, DriveFile, DriveScope, FOLDER_MIME_TYPE,
    FileList, ParentUpdate, ResourceType,
};
pub use reqwest::StatusCode;
