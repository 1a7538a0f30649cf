//! Layered overlay window (topmost while shown, click-through)

use crate::{OverlayError, OverlayResult, OverlaySurface, Rect, WindowId};
use media::Frame;
use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::mem::size_of;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, EndPaint, FillRect, GetDC, GetStockObject, ReleaseDC, SetDIBitsToDevice,
    BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBRUSH, HDC, PAINTSTRUCT, WHITE_BRUSH,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GetClientRect, RegisterClassExW, SetLayeredWindowAttributes,
    SetWindowPos, HTTRANSPARENT, HWND_NOTOPMOST, HWND_TOPMOST, LWA_ALPHA, LWA_COLORKEY,
    SWP_HIDEWINDOW, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SWP_SHOWWINDOW,
    WM_ERASEBKGND, WM_NCHITTEST, WM_PAINT, WNDCLASSEXW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_POPUP,
};

const OVERLAY_CLASS: PCWSTR = w!("FreedomWallOverlay");

/// Pure white is keyed out, so white areas of a wallpaper show the target
pub const COLOR_KEY: COLORREF = COLORREF(0x00FF_FFFF);

const MIN_SIZE: i32 = 10;

static REGISTER: OnceCell<()> = OnceCell::new();

thread_local! {
    // Last presented frame, repainted on WM_PAINT
    static LAST_FRAME: RefCell<Option<Frame>> = RefCell::new(None);
}

fn register_class() -> OverlayResult<()> {
    REGISTER
        .get_or_try_init(|| unsafe {
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);
            let wc = WNDCLASSEXW {
                cbSize: size_of::<WNDCLASSEXW>() as u32,
                lpfnWndProc: Some(overlay_wnd_proc),
                hInstance: hinstance,
                lpszClassName: OVERLAY_CLASS,
                ..Default::default()
            };

            if RegisterClassExW(&wc) == 0 {
                return Err(OverlayError::Windows(windows::core::Error::from_win32()));
            }
            Ok(())
        })
        .map(|_| ())
}

fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

fn alpha_byte(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// The overlay window. Created hidden.
pub struct OverlayWindow {
    hwnd: HWND,
    title: String,
}

impl OverlayWindow {
    /// Create the hidden overlay window on the current thread
    pub fn create(title: &str) -> OverlayResult<Self> {
        register_class()?;
        let title_wide = to_wide(title);

        unsafe {
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);

            let hwnd = CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                OVERLAY_CLASS,
                PCWSTR(title_wide.as_ptr()),
                WS_POPUP,
                0,
                0,
                MIN_SIZE,
                MIN_SIZE,
                None,
                None,
                hinstance,
                None,
            )?;

            SetLayeredWindowAttributes(hwnd, COLOR_KEY, alpha_byte(0.1), LWA_COLORKEY | LWA_ALPHA)?;

            tracing::debug!(hwnd = hwnd.0 as isize, title, "overlay window created");
            Ok(Self {
                hwnd,
                title: title.to_string(),
            })
        }
    }
}

impl OverlaySurface for OverlayWindow {
    fn id(&self) -> WindowId {
        self.hwnd.0 as WindowId
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn set_shown(&mut self, shown: bool) -> OverlayResult<()> {
        let (insert_after, show_flag) = if shown {
            (HWND_TOPMOST, SWP_SHOWWINDOW)
        } else {
            (HWND_NOTOPMOST, SWP_HIDEWINDOW)
        };

        unsafe {
            SetWindowPos(
                self.hwnd,
                insert_after,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | show_flag,
            )?;
        }
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f32) -> OverlayResult<()> {
        unsafe {
            SetLayeredWindowAttributes(
                self.hwnd,
                COLOR_KEY,
                alpha_byte(opacity),
                LWA_COLORKEY | LWA_ALPHA,
            )?;
        }
        Ok(())
    }

    fn set_bounds(&mut self, rect: Rect) -> OverlayResult<()> {
        unsafe {
            SetWindowPos(
                self.hwnd,
                None,
                rect.x,
                rect.y,
                (rect.width as i32).max(MIN_SIZE),
                (rect.height as i32).max(MIN_SIZE),
                SWP_NOZORDER | SWP_NOACTIVATE,
            )?;
        }
        Ok(())
    }

    fn present(&mut self, frame: Frame) -> OverlayResult<()> {
        unsafe {
            let hdc = GetDC(self.hwnd);
            if hdc.is_invalid() {
                return Err(OverlayError::WindowQuery("failed to get overlay DC".into()));
            }
            draw_frame(hdc, &frame);
            ReleaseDC(self.hwnd, hdc);
        }

        LAST_FRAME.with(|last| *last.borrow_mut() = Some(frame));
        Ok(())
    }

    fn clear(&mut self) -> OverlayResult<()> {
        LAST_FRAME.with(|last| *last.borrow_mut() = None);

        unsafe {
            let hdc = GetDC(self.hwnd);
            if hdc.is_invalid() {
                return Err(OverlayError::WindowQuery("failed to get overlay DC".into()));
            }
            fill_key(self.hwnd, hdc);
            ReleaseDC(self.hwnd, hdc);
        }
        Ok(())
    }

    fn close(&mut self) {
        unsafe {
            let _ = DestroyWindow(self.hwnd);
        }
        LAST_FRAME.with(|last| *last.borrow_mut() = None);
    }
}

/// Paint the client area in the key color, which the compositor drops
unsafe fn fill_key(hwnd: HWND, hdc: HDC) {
    let mut rect = RECT::default();
    if GetClientRect(hwnd, &mut rect).is_ok() {
        // The stock white brush matches COLOR_KEY
        FillRect(hdc, &rect, HBRUSH(GetStockObject(WHITE_BRUSH).0));
    }
}

unsafe fn draw_frame(hdc: HDC, frame: &Frame) {
    let width = frame.width as i32;
    let height = frame.height as i32;

    let bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width,
            biHeight: -height, // Top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            biSizeImage: 0,
            biXPelsPerMeter: 0,
            biYPelsPerMeter: 0,
            biClrUsed: 0,
            biClrImportant: 0,
        },
        bmiColors: [Default::default()],
    };

    SetDIBitsToDevice(
        hdc,
        0,
        0,
        frame.width,
        frame.height,
        0,
        0,
        0,
        frame.height,
        frame.data.as_ptr() as *const _,
        &bmi,
        DIB_RGB_COLORS,
    );
}

unsafe extern "system" fn overlay_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_NCHITTEST => LRESULT(HTTRANSPARENT as isize),
        WM_ERASEBKGND => LRESULT(1),
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);
            LAST_FRAME.with(|last| match *last.borrow() {
                Some(ref frame) => draw_frame(hdc, frame),
                None => fill_key(hwnd, hdc),
            });
            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
