//! macOS-specific utilities.
//!
//! Thin wrappers over AppKit and CoreGraphics calls. Every function has a
//! non-macOS counterpart returning a neutral value so the rest of the crate
//! builds and tests everywhere.

#[cfg(target_os = "macos")]
mod imp {
    use cocoa::appkit::{NSApp, NSApplication, NSApplicationActivationPolicy};
    use cocoa::base::{id, nil};
    use cocoa::foundation::{
        NSArray, NSAutoreleasePool, NSPoint, NSRect, NSSize, NSString, NSUInteger,
    };
    use objc::runtime::{BOOL, NO, YES};
    use objc::{class, msg_send, sel, sel_impl};
    use std::ffi::c_void;
    use std::path::{Path, PathBuf};

    use crate::types::Pid;

    const ACTIVATE_ALL_WINDOWS: NSUInteger = 1 << 0;
    const ACTIVATE_IGNORING_OTHER_APPS: NSUInteger = 1 << 1;
    const WINDOW_LIST_ON_SCREEN_ONLY: u32 = 1 << 0;
    const WINDOW_LIST_EXCLUDE_DESKTOP: u32 = 1 << 4;
    const NULL_WINDOW_ID: u32 = 0;
    const AIRDROP_SERVICE: &str = "com.apple.share.AirDrop.send";
    const BITMAP_FILE_TYPE_PNG: NSUInteger = 4;

    #[link(name = "CoreGraphics", kind = "framework")]
    unsafe extern "C" {
        fn CGWindowListCopyWindowInfo(option: u32, relative_to_window: u32) -> id;
    }

    unsafe fn ns_string(s: &str) -> id {
        unsafe { NSString::alloc(nil).init_str(s).autorelease() }
    }

    unsafe fn running_application(pid: Pid) -> id {
        unsafe {
            msg_send![class!(NSRunningApplication), runningApplicationWithProcessIdentifier: pid as i32]
        }
    }

    /// Hide the Dock icon; the panel lives without one.
    pub fn set_accessory_policy() {
        unsafe {
            let app = NSApp();
            app.setActivationPolicy_(
                NSApplicationActivationPolicy::NSApplicationActivationPolicyAccessory,
            );
        }
    }

    /// Current global modifier flags, raw `NSEventModifierFlags` bits.
    pub fn modifier_flags() -> u64 {
        unsafe {
            let flags: NSUInteger = msg_send![class!(NSEvent), modifierFlags];
            flags as u64
        }
    }

    /// Mouse location in top-left based screen points of the main screen.
    pub fn mouse_location() -> (f32, f32) {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let location: NSPoint = msg_send![class!(NSEvent), mouseLocation];
            let screen: id = msg_send![class!(NSScreen), mainScreen];
            let point = if screen == nil {
                (location.x as f32, location.y as f32)
            } else {
                let frame: NSRect = msg_send![screen, frame];
                (location.x as f32, (frame.size.height - location.y) as f32)
            };
            let _: () = msg_send![pool, drain];
            point
        }
    }

    pub fn frontmost_pid() -> Option<Pid> {
        unsafe {
            let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
            let app: id = msg_send![workspace, frontmostApplication];
            if app == nil {
                return None;
            }
            let pid: i32 = msg_send![app, processIdentifier];
            u32::try_from(pid).ok()
        }
    }

    /// `Some(true)` for apps with the regular activation policy, `None` if unknown.
    pub fn is_regular_app(pid: Pid) -> Option<bool> {
        unsafe {
            let app = running_application(pid);
            if app == nil {
                return None;
            }
            let policy: isize = msg_send![app, activationPolicy];
            Some(policy == 0)
        }
    }

    /// Callable from worker threads: runs inside its own autorelease pool.
    pub fn activate_app(pid: Pid) -> bool {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let app = running_application(pid);
            let mut ok = false;
            if app != nil {
                let hidden: BOOL = msg_send![app, isHidden];
                if hidden == YES {
                    let _: BOOL = msg_send![app, unhide];
                }
                let activated: BOOL = msg_send![
                    app,
                    activateWithOptions: ACTIVATE_ALL_WINDOWS | ACTIVATE_IGNORING_OTHER_APPS
                ];
                ok = activated == YES;
            }
            let _: () = msg_send![pool, drain];
            ok
        }
    }

    /// Ask the app to quit the way the Dock's Quit item does.
    /// Callable from worker threads: runs inside its own autorelease pool.
    pub fn terminate_app(pid: Pid) -> Option<bool> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let app = running_application(pid);
            let result = if app == nil {
                None
            } else {
                let ok: BOOL = msg_send![app, terminate];
                Some(ok == YES)
            };
            let _: () = msg_send![pool, drain];
            result
        }
    }

    /// PNG bytes of an app icon, picked for a `side` point square. Uses the
    /// bundle's declared icon file when it loads, else the icon Finder shows.
    pub fn icon_png(icon_file: Option<&Path>, bundle: &Path, side: f64) -> Option<Vec<u8>> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let mut image: id = nil;
            if let Some(file) = icon_file {
                let alloc: id = msg_send![class!(NSImage), alloc];
                let loaded: id =
                    msg_send![alloc, initWithContentsOfFile: ns_string(&file.to_string_lossy())];
                if loaded != nil {
                    image = msg_send![loaded, autorelease];
                }
            }
            if image == nil {
                let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
                image = msg_send![workspace, iconForFile: ns_string(&bundle.to_string_lossy())];
            }
            let png = if image == nil {
                None
            } else {
                png_representation(image, side)
            };
            let _: () = msg_send![pool, drain];
            png
        }
    }

    unsafe fn png_representation(image: id, side: f64) -> Option<Vec<u8>> {
        unsafe {
            let rect = NSRect::new(NSPoint::new(0.0, 0.0), NSSize::new(side, side));
            let best: id = msg_send![image, bestRepresentationForRect: rect context: nil hints: nil];
            let mut bitmap: id = nil;
            if best != nil {
                let is_bitmap: BOOL = msg_send![best, isKindOfClass: class!(NSBitmapImageRep)];
                if is_bitmap == YES {
                    bitmap = best;
                }
            }
            if bitmap == nil {
                // vector or other reps: go through a TIFF rendering
                let tiff: id = msg_send![image, TIFFRepresentation];
                if tiff == nil {
                    return None;
                }
                bitmap = msg_send![class!(NSBitmapImageRep), imageRepWithData: tiff];
                if bitmap == nil {
                    return None;
                }
            }

            let props: id = msg_send![class!(NSDictionary), dictionary];
            let data: id =
                msg_send![bitmap, representationUsingType: BITMAP_FILE_TYPE_PNG properties: props];
            if data == nil {
                return None;
            }
            let len: NSUInteger = msg_send![data, length];
            let bytes: *const c_void = msg_send![data, bytes];
            if bytes.is_null() || len == 0 {
                return None;
            }
            Some(std::slice::from_raw_parts(bytes.cast::<u8>(), len as usize).to_vec())
        }
    }

    /// Whether the process owns at least one on-screen, normal-layer, non-transparent window.
    pub fn has_visible_window(pid: Pid) -> bool {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let list = CGWindowListCopyWindowInfo(
                WINDOW_LIST_ON_SCREEN_ONLY | WINDOW_LIST_EXCLUDE_DESKTOP,
                NULL_WINDOW_ID,
            );
            if list == nil {
                let _: () = msg_send![pool, drain];
                return false;
            }

            let owner_key = ns_string("kCGWindowOwnerPID");
            let layer_key = ns_string("kCGWindowLayer");
            let alpha_key = ns_string("kCGWindowAlpha");

            let count: NSUInteger = msg_send![list, count];
            let mut found = false;
            for i in 0..count {
                let info: id = msg_send![list, objectAtIndex: i];
                let owner: id = msg_send![info, objectForKey: owner_key];
                if owner == nil {
                    continue;
                }
                let owner_pid: i64 = msg_send![owner, longLongValue];
                if owner_pid != i64::from(pid) {
                    continue;
                }
                let layer: id = msg_send![info, objectForKey: layer_key];
                if layer != nil {
                    let layer: i64 = msg_send![layer, longLongValue];
                    if layer != 0 {
                        continue;
                    }
                }
                let alpha: id = msg_send![info, objectForKey: alpha_key];
                if alpha != nil {
                    let alpha: f64 = msg_send![alpha, doubleValue];
                    if alpha <= 0.01 {
                        continue;
                    }
                }
                found = true;
                break;
            }

            let _: () = msg_send![list, release];
            let _: () = msg_send![pool, drain];
            found
        }
    }

    /// Hand files to the AirDrop sharing service. Must run on the main thread.
    pub fn share_via_airdrop(paths: &[PathBuf]) -> bool {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let service: id = msg_send![
                class!(NSSharingService),
                sharingServiceNamed: ns_string(AIRDROP_SERVICE)
            ];
            if service == nil {
                let _: () = msg_send![pool, drain];
                return false;
            }

            let urls: Vec<id> = paths
                .iter()
                .map(|p| {
                    let url: id = msg_send![
                        class!(NSURL),
                        fileURLWithPath: ns_string(&p.to_string_lossy())
                    ];
                    url
                })
                .filter(|url| *url != nil)
                .collect();
            let items = NSArray::arrayWithObjects(nil, &urls);

            let can: BOOL = msg_send![service, canPerformWithItems: items];
            let ok = if can == NO {
                false
            } else {
                let _: () = msg_send![service, performWithItems: items];
                true
            };
            let _: () = msg_send![pool, drain];
            ok
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod imp {
    use std::path::{Path, PathBuf};

    use crate::types::Pid;

    pub fn set_accessory_policy() {}

    pub fn modifier_flags() -> u64 {
        0
    }

    pub fn mouse_location() -> (f32, f32) {
        (0.0, 0.0)
    }

    pub fn frontmost_pid() -> Option<Pid> {
        None
    }

    pub fn is_regular_app(_pid: Pid) -> Option<bool> {
        None
    }

    pub fn activate_app(_pid: Pid) -> bool {
        false
    }

    pub fn terminate_app(_pid: Pid) -> Option<bool> {
        None
    }

    pub fn icon_png(_icon_file: Option<&Path>, _bundle: &Path, _side: f64) -> Option<Vec<u8>> {
        None
    }

    pub fn has_visible_window(_pid: Pid) -> bool {
        true
    }

    pub fn share_via_airdrop(_paths: &[PathBuf]) -> bool {
        false
    }
}

pub use imp::*;
