//! Win32 window queries

use crate::{ForegroundWindow, OverlayError, OverlayResult, Rect, WindowId, WindowSystem};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Dwm::{DwmGetWindowAttribute, DWMWA_EXTENDED_FRAME_BOUNDS};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetForegroundWindow, GetWindowLongPtrW, GetWindowRect, GetWindowTextW,
    SetWindowLongPtrW, GWL_EXSTYLE, WS_EX_LAYERED, WS_EX_TRANSPARENT,
};

const TITLE_CAPACITY: usize = 512;

pub(crate) fn hwnd_from_id(id: WindowId) -> HWND {
    HWND(id as *mut std::ffi::c_void)
}

unsafe fn window_title(hwnd: HWND) -> String {
    let mut buf = [0u16; TITLE_CAPACITY];
    let len = GetWindowTextW(hwnd, &mut buf);
    if len <= 0 {
        return String::new();
    }
    String::from_utf16_lossy(&buf[..len as usize])
}

unsafe extern "system" fn enum_window_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<(WindowId, String)>);
    windows.push((hwnd.0 as WindowId, window_title(hwnd)));
    BOOL(1) // Continue enumeration
}

/// [`WindowSystem`] backed by user32 and DWM
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Windows;

impl WindowSystem for Win32Windows {
    fn foreground_window(&self) -> OverlayResult<ForegroundWindow> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.is_invalid() {
                return Ok(ForegroundWindow::default());
            }

            Ok(ForegroundWindow {
                id: hwnd.0 as WindowId,
                title: window_title(hwnd),
            })
        }
    }

    fn window_rect(&self, id: WindowId) -> OverlayResult<Rect> {
        let hwnd = hwnd_from_id(id);
        let mut rect = RECT::default();

        unsafe {
            // The extended frame excludes the invisible resize borders.
            let dwm = DwmGetWindowAttribute(
                hwnd,
                DWMWA_EXTENDED_FRAME_BOUNDS,
                &mut rect as *mut RECT as *mut _,
                std::mem::size_of::<RECT>() as u32,
            );

            if dwm.is_err() {
                GetWindowRect(hwnd, &mut rect)
                    .map_err(|e| OverlayError::WindowQuery(e.to_string()))?;
            }
        }

        Ok(Rect::from_ltrb(rect.left, rect.top, rect.right, rect.bottom))
    }

    fn window_titles(&self) -> OverlayResult<Vec<(WindowId, String)>> {
        let mut windows: Vec<(WindowId, String)> = Vec::new();

        unsafe {
            EnumWindows(
                Some(enum_window_callback),
                LPARAM(&mut windows as *mut Vec<(WindowId, String)> as isize),
            )
            .map_err(|e| OverlayError::WindowQuery(e.to_string()))?;
        }

        Ok(windows)
    }

    fn set_click_through(&self, id: WindowId) -> OverlayResult<()> {
        let hwnd = hwnd_from_id(id);

        unsafe {
            let style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
            let style = style | (WS_EX_LAYERED.0 | WS_EX_TRANSPARENT.0) as isize;
            SetWindowLongPtrW(hwnd, GWL_EXSTYLE, style);

            let applied = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
            if applied & WS_EX_TRANSPARENT.0 as isize == 0 {
                return Err(OverlayError::WindowQuery(
                    "click-through style was not applied".into(),
                ));
            }
        }

        Ok(())
    }
}
