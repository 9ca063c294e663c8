use custom_error::custom_error;

custom_error! {pub GIFError
    FailedToWrite {description: String} = "Failed to write gif: {description}",
    FailedToRead {description: String} = "Failed to read gif: {description}",
    InvalidHeader {description: String} = "Invalid header: {description}",
    InvalidBlock {description: String} = "Invalid block: {description}",
    InvalidImage {description: String} = "Invalid image: {description}",
    NotImplemented {description: String} = "Not implemented: {description}"
}
