#[macro_export]
macro_rules! hwnd {
    ($self:expr) => {
        windows::Win32::Foundation::HWND($self as *mut std::ffi::c_void)
    };
}
